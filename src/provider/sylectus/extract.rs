//! HTML Load Extractor for Sylectus results tables.
//!
//! Parses a server-rendered results-table fragment into normalized
//! [`Load`] records. The extractor walks every `<tr>`, skips structural
//! rows (headers, the "record(s) found" summary, merged note rows, rows
//! with too few cells), and extracts each remaining row independently: a
//! malformed row is logged and skipped, never aborting the rest of the
//! table.
//!
//! Each extracted load carries both the normalized shape and, under
//! `extras.legacy`, the raw extracted fields in the old flat shape.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::{LoadId, SearchModuleId};
use crate::model::{Contact, Load, LoadExtras, Provider};
use crate::provider::sylectus::fields::{
    line_as_u32, markup_lines, normalize_whitespace, onclick_url, parse_location, parse_money,
    parse_sylectus_datetime, strip_trailing_digits, text_as_u32,
};

// ============================================================================
// Constants
// ============================================================================

/// Minimum cell count for a row to be a load posting.
const MIN_LOAD_CELLS: usize = 10;

// ============================================================================
// Column Layout
// ============================================================================

// Fixed Sylectus results-table column positions.
const COL_ORDER: usize = 0;
const COL_COMPANY: usize = 1;
const COL_AMOUNT: usize = 2;
const COL_PICKUP: usize = 3;
const COL_DELIVERY: usize = 4;
const COL_POSTED: usize = 5;
const COL_PICKUP_DATES: usize = 6;
const COL_VEHICLE: usize = 7;
const COL_MILES: usize = 8;
const COL_WEIGHT: usize = 9;
const COL_PIECES: usize = 10;
const COL_NOTES: usize = 11;

// ============================================================================
// Selectors / Regexes
// ============================================================================

static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));

static HEADER_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th").expect("valid selector"));

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("valid selector"));

static ORDER_NO_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)[?&](?:order_no|orderno|id)=([A-Za-z0-9_-]+)").expect("valid regex")
});

// ============================================================================
// Public Entry Point
// ============================================================================

/// Extracts normalized loads from a Sylectus results-table fragment.
///
/// Structural rows are skipped silently; malformed posting rows are
/// logged at `warn` and skipped. This function never fails: worst case
/// is an empty vector.
#[must_use]
pub fn extract_loads(html: &str, search_module_id: &SearchModuleId) -> Vec<Load> {
    let document = Html::parse_fragment(html);
    let mut loads = Vec::new();

    for (index, row) in document.select(&ROW_SELECTOR).enumerate() {
        match extract_row(index, row, search_module_id) {
            Ok(Some(load)) => loads.push(load),
            Ok(None) => {}
            Err(error) => {
                warn!(row = index, %error, "skipping malformed results row");
            }
        }
    }

    debug!(
        search_module_id = %search_module_id,
        loads = loads.len(),
        "extracted loads from results table"
    );
    loads
}

// ============================================================================
// Row Extraction
// ============================================================================

/// Extracts one table row, or `Ok(None)` for structural rows.
fn extract_row(
    index: usize,
    row: ElementRef<'_>,
    search_module_id: &SearchModuleId,
) -> Result<Option<Load>> {
    // Header row.
    if row.select(&HEADER_SELECTOR).next().is_some() {
        return Ok(None);
    }

    // Trailing summary row ("NN record(s) found").
    let row_text: String = row.text().collect();
    if row_text.contains("record(s) found") {
        return Ok(None);
    }

    let cells = direct_cells(row);

    // Merged single-cell note row, or anything too short to be a posting.
    if cells.len() < MIN_LOAD_CELLS {
        return Ok(None);
    }

    let (order_no, bid_url) = extract_order(cell(&cells, COL_ORDER, index)?);
    let company = extract_company(cell(&cells, COL_COMPANY, index)?);
    let rate = parse_money(&cell_text(cell(&cells, COL_AMOUNT, index)?)).unwrap_or_default();

    let pickup_text = cell_text(cell(&cells, COL_PICKUP, index)?);
    let delivery_text = cell_text(cell(&cells, COL_DELIVERY, index)?);
    let origin = parse_location(&pickup_text);
    let destination = parse_location(&delivery_text);

    // Posted/expires share a cell, as do pickup/delivery dates.
    let posted_lines = cell_lines(cell(&cells, COL_POSTED, index)?);
    let posted_at = date_line(&posted_lines, 0);
    let expires_at = opt_date_line(&posted_lines, 1);

    let pickup_lines = cell_lines(cell(&cells, COL_PICKUP_DATES, index)?);
    let pickup_at = opt_date_line(&pickup_lines, 0);
    let deliver_by = opt_date_line(&pickup_lines, 1);

    // Vehicle size with the full/partial flag on the second line. The
    // size label sometimes arrives with a numeric code glued on.
    let vehicle_lines = cell_lines(cell(&cells, COL_VEHICLE, index)?);
    let equipment_type = vehicle_lines
        .first()
        .map(|line| strip_trailing_digits(line))
        .unwrap_or_default();
    let full_partial = vehicle_lines.get(1).cloned().unwrap_or_default();

    // Label-over-value cells: the number sits on the second line.
    let miles_lines = cell_lines(cell(&cells, COL_MILES, index)?);
    let miles = numeric_cell(&miles_lines);
    let weight_lines = cell_lines(cell(&cells, COL_WEIGHT, index)?);
    let weight = numeric_cell(&weight_lines);

    // Optional trailing columns.
    let pieces = cells
        .get(COL_PIECES)
        .map(|c| cell_lines(*c))
        .and_then(|lines| lines.last().and_then(|line| text_as_u32(line)));
    let comment = cells
        .get(COL_NOTES)
        .map(|c| cell_text(*c))
        .unwrap_or_default();

    let id = match &order_no {
        Some(order_no) => LoadId::from_string(order_no),
        None => LoadId::synthesize(),
    };

    // Raw extracted fields in the pre-normalization flat shape, kept for
    // consumers of the old dashboard payload.
    let legacy = json!({
        "orderNo": order_no.clone(),
        "company": company.name.clone(),
        "amount": rate,
        "pickup": pickup_text,
        "delivery": delivery_text,
        "postDate": posted_lines.first(),
        "expires": posted_lines.get(1),
        "pickUp": pickup_at.clone(),
        "deliverBy": deliver_by.clone(),
        "vehicleSize": vehicle_lines.first(),
        "miles": miles,
        "weight": weight,
        "pieces": pieces,
        "notes": comment.clone(),
        "bidUrl": bid_url.clone(),
        "saferUrl": company.safer_url.clone(),
        "creditDaysToPay": company.credit_days_to_pay,
        "creditScore": company.credit_score,
    });

    Ok(Some(Load {
        id,
        posted_at,
        origin,
        destination,
        contact: Contact {
            company: company.name,
            ..Contact::default()
        },
        rate,
        comment,
        equipment_type,
        miles,
        weight,
        full_partial,
        deadhead_miles: 0,
        credit_score: company.credit_score,
        source: Provider::Sylectus,
        search_module_id: search_module_id.clone(),
        extras: LoadExtras {
            ref_no: order_no,
            bid_url,
            safer_url: company.safer_url,
            pickup_at,
            deliver_by,
            expires_at,
            pieces,
            credit_days_to_pay: company.credit_days_to_pay,
            legacy: Some(legacy),
        },
    }))
}

// ============================================================================
// Cell Helpers
// ============================================================================

/// Direct `<td>` children of a row.
///
/// A descendant selector would also pick up cells of nested sub-tables,
/// inflating the column count.
fn direct_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "td")
        .collect()
}

/// Returns the cell at `index`, or an extraction error naming the row.
fn cell<'a>(
    cells: &[ElementRef<'a>],
    index: usize,
    row: usize,
) -> Result<ElementRef<'a>> {
    cells
        .get(index)
        .copied()
        .ok_or_else(|| Error::extraction_row(row, format!("missing cell {index}")))
}

/// Normalized plain text of a cell.
fn cell_text(cell: ElementRef<'_>) -> String {
    normalize_whitespace(&cell.text().collect::<String>())
}

/// Trimmed non-empty lines of a cell, split on newlines and break tags.
fn cell_lines(cell: ElementRef<'_>) -> Vec<String> {
    markup_lines(&cell.inner_html())
}

/// Normalized date from the line at `index`, empty string when absent.
fn date_line(lines: &[String], index: usize) -> String {
    lines
        .get(index)
        .map(|line| parse_sylectus_datetime(line))
        .unwrap_or_default()
}

/// Normalized date from the line at `index`, `None` when absent.
fn opt_date_line(lines: &[String], index: usize) -> Option<String> {
    lines.get(index).map(|line| parse_sylectus_datetime(line))
}

/// Value of a label-over-value cell.
///
/// Two lines means label then value; one line means the value alone.
fn numeric_cell(lines: &[String]) -> u32 {
    if lines.len() >= 2 {
        line_as_u32(lines, 1)
    } else {
        line_as_u32(lines, 0)
    }
}

// ============================================================================
// Link Extraction
// ============================================================================

/// Order number and bid URL from the first column.
///
/// The order number comes only from a recognized link query parameter;
/// a row without one gets a synthesized load ID upstream.
fn extract_order(cell: ElementRef<'_>) -> (Option<String>, Option<String>) {
    let mut order_no = None;
    let mut bid_url = None;

    for link in cell.select(&LINK_SELECTOR) {
        if order_no.is_none() {
            if let Some(href) = link.value().attr("href") {
                order_no = ORDER_NO_RE
                    .captures(href)
                    .map(|caps| caps[1].to_string());
            }
        }
        if bid_url.is_none() {
            if let Some(onclick) = link.value().attr("onclick") {
                if onclick.to_lowercase().contains("bid") {
                    bid_url = onclick_url(onclick);
                }
            }
        }
    }

    (order_no, bid_url)
}

/// Extracted pieces of the company column.
#[derive(Debug, Default)]
struct CompanyInfo {
    name: String,
    safer_url: Option<String>,
    credit_days_to_pay: Option<u32>,
    credit_score: Option<u32>,
}

/// Company name, SAFER URL and credit figures from the second column.
///
/// The company-profile link carries the name; two credit-history links
/// carry days-to-pay then score, supplied only when both are present.
fn extract_company(cell: ElementRef<'_>) -> CompanyInfo {
    let links: Vec<ElementRef<'_>> = cell.select(&LINK_SELECTOR).collect();

    let profile = links
        .iter()
        .find(|link| onclick_of(link).contains("company_profile"))
        .or(links.first());
    let name = profile
        .map(|link| normalize_whitespace(&link.text().collect::<String>()))
        .unwrap_or_default();

    let safer_url = links
        .iter()
        .find(|link| onclick_of(link).to_lowercase().contains("safer"))
        .and_then(|link| onclick_url(&onclick_of(link)));

    let credit: Vec<u32> = links
        .iter()
        .filter(|link| onclick_of(link).contains("credit_history"))
        .filter_map(|link| text_as_u32(&link.text().collect::<String>()))
        .collect();
    let (credit_days_to_pay, credit_score) = match credit.as_slice() {
        [days, score, ..] => (Some(*days), Some(*score)),
        _ => (None, None),
    };

    CompanyInfo {
        name,
        safer_url,
        credit_days_to_pay,
        credit_score,
    }
}

fn onclick_of(link: &ElementRef<'_>) -> String {
    link.value().attr("onclick").unwrap_or_default().to_string()
}

// ============================================================================
// Tests
// ============================================================================
