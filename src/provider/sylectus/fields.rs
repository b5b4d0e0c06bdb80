//! Field-level parsing helpers for the Sylectus extractor.
//!
//! Every helper is tolerant: missing or malformed input yields a safe
//! default (empty string, zero, `None`) rather than an error, so one
//! absent sub-element never poisons the rest of its row.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::model::Location;

// ============================================================================
// Regexes
// ============================================================================

/// Inline break tags (`<br>`, `<br/>`, `<BR>`), replaced with newlines.
static BR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));

/// Any remaining markup tag.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// Two-letter state code followed by a 5-digit ZIP.
static STATE_ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{2})\s*(\d{5})").expect("valid regex"));

/// Two-letter state code alone.
static STATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([A-Z]{2})").expect("valid regex"));

/// Trailing digit run concatenated onto a label.
static TRAILING_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+$").expect("valid regex"));

/// Quoted URL inside an inline event handler.
static ONCLICK_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(https?://[^']+)'").expect("valid regex"));

// ============================================================================
// Text Helpers
// ============================================================================

/// Collapses runs of whitespace to single spaces and trims.
#[must_use]
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decodes the markup entities observed in Sylectus cells.
#[must_use]
pub(crate) fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Splits cell markup into trimmed, non-empty lines.
///
/// Date cells carry two values separated either by a raw text newline or
/// by an inline break tag, depending on which cell they live in; both
/// representations must split. Break tags become newlines first, then
/// remaining markup is stripped and entities decoded.
#[must_use]
pub(crate) fn markup_lines(inner_html: &str) -> Vec<String> {
    let with_breaks = BR_RE.replace_all(inner_html, "\n");
    let stripped = TAG_RE.replace_all(&with_breaks, " ");
    let decoded = decode_entities(&stripped);

    decoded
        .lines()
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Parses an integer from the line at `index`, ignoring separators.
///
/// Non-numeric content yields zero.
#[must_use]
pub(crate) fn line_as_u32(lines: &[String], index: usize) -> u32 {
    lines
        .get(index)
        .map(|line| {
            line.chars()
                .filter(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .and_then(|digits| digits.parse().ok())
        .unwrap_or_default()
}

/// Parses an integer out of arbitrary text, ignoring separators.
#[must_use]
pub(crate) fn text_as_u32(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Strips a trailing digit run concatenated onto a label.
///
/// Observed artifact: a numeric code glued directly onto the vehicle
/// size, e.g. `"SMALL STRAIGHT390"` → `"SMALL STRAIGHT"`.
#[must_use]
pub(crate) fn strip_trailing_digits(text: &str) -> String {
    TRAILING_DIGITS_RE.replace(text.trim(), "").trim().to_string()
}

/// Parses a dollar amount, tolerating `$` and thousands separators.
#[must_use]
pub(crate) fn parse_money(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Extracts a quoted URL from an inline `onclick` handler.
///
/// The live link target is constructed client-side at click time, so the
/// URL has to come from the handler source, not the `href`.
#[must_use]
pub(crate) fn onclick_url(onclick: &str) -> Option<String> {
    ONCLICK_URL_RE
        .captures(onclick)
        .map(|caps| caps[1].to_string())
}

// ============================================================================
// Location Parsing
// ============================================================================

/// Parses a `"City, ST 12345"`-shaped string.
///
/// Splits on the first comma, then matches a two-letter state code with
/// an optional 5-digit ZIP from the remainder; when the ZIP pattern fails
/// the state code alone is extracted. A string with no comma becomes the
/// city. The unparsed input is preserved on `full_address`.
#[must_use]
pub fn parse_location(text: &str) -> Location {
    let full = normalize_whitespace(text);
    if full.is_empty() {
        return Location::default();
    }

    let mut location = Location {
        full_address: Some(full.clone()),
        ..Location::default()
    };

    match full.split_once(',') {
        Some((city, rest)) => {
            location.city = city.trim().to_string();
            let rest = rest.trim();

            if let Some(caps) = STATE_ZIP_RE.captures(rest) {
                location.state = caps[1].to_string();
                location.zip_code = Some(caps[2].to_string());
            } else if let Some(caps) = STATE_RE.captures(rest) {
                location.state = caps[1].to_string();
            }
        }
        None => {
            location.city = full;
        }
    }

    location
}

// ============================================================================
// Date Parsing
// ============================================================================

/// ISO-8601 output format (timezone-naive local time).
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Normalizes one raw Sylectus date token.
///
/// - `"ASAP"` and anything containing `"direct"` (case-insensitive)
///   resolve to the current instant;
/// - `MM/DD/YYYY HH:MM` and `MM/DD/YYYY` parse to a timezone-naive
///   local date/time in ISO-8601;
/// - other tokens that already look like ISO date/times pass through;
/// - anything else non-empty is returned verbatim, never dropped.
#[must_use]
pub fn parse_sylectus_datetime(token: &str) -> String {
    let token = token.trim();
    if token.is_empty() {
        return String::new();
    }

    let lower = token.to_lowercase();
    if lower == "asap" || lower.contains("direct") {
        return Local::now().naive_local().format(ISO_FORMAT).to_string();
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(token, "%m/%d/%Y %H:%M") {
        return datetime.format(ISO_FORMAT).to_string();
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%m/%d/%Y") {
        if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
            return datetime.format(ISO_FORMAT).to_string();
        }
    }

    // Generic fallback for tokens already in an ISO shape.
    if let Ok(datetime) = NaiveDateTime::parse_from_str(token, ISO_FORMAT) {
        return datetime.format(ISO_FORMAT).to_string();
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(token) {
        return datetime.naive_local().format(ISO_FORMAT).to_string();
    }

    token.to_string()
}

// ============================================================================
// Tests
// ============================================================================
