//! Provider-agnostic data model.
//!
//! Everything shared code sees is defined here: the generic
//! [`SearchRequest`], the per-provider [`SearchResult`] with its
//! normalized [`Load`] records, and the durable user-visible [`Lane`]
//! aggregate. Provider-specific payload shapes never leave their adapter;
//! they are normalized into these types at the adapter boundary.
//!
//! Wire format is camelCase JSON throughout, matching the extension
//! envelope and the persisted storage values.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{LaneId, LoadId, SearchModuleId};

// ============================================================================
// Provider
// ============================================================================

/// Load-board provider tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// DAT load board (reached through the extension's direct relay).
    #[serde(rename = "DAT")]
    Dat,
    /// Sylectus load board (server-rendered HTML captured by the relay).
    #[serde(rename = "SYLECTUS")]
    Sylectus,
}

impl Provider {
    /// Returns the wire tag for this provider.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dat => "DAT",
            Self::Sylectus => "SYLECTUS",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Location
// ============================================================================

/// A city/state place, with optional ZIP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// City name.
    #[serde(default)]
    pub city: String,

    /// Two-letter state code.
    #[serde(default)]
    pub state: String,

    /// Five-digit ZIP, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,

    /// The unparsed source string, when the location came from markup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_address: Option<String>,
}

impl Location {
    /// Creates a location from city and state.
    #[inline]
    #[must_use]
    pub fn new(city: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            state: state.into(),
            zip_code: None,
            full_address: None,
        }
    }

    /// Returns `true` if no component is populated.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.city.is_empty() && self.state.is_empty() && self.zip_code.is_none()
    }
}

// ============================================================================
// Contact
// ============================================================================

/// Posting contact information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Posting company name.
    #[serde(default)]
    pub company: String,

    /// Contact person, when known.
    #[serde(default)]
    pub name: String,

    /// Phone number, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Email address, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

// ============================================================================
// LoadExtras
// ============================================================================

/// Provider-specific passthrough fields preserved on a normalized load.
///
/// The Sylectus extractor additionally keeps its raw extracted fields
/// under `legacy` so existing consumers of the old shape keep working -
/// a deliberate backward-compatibility duplication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadExtras {
    /// Provider reference/order number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_no: Option<String>,

    /// Bid submission URL, when extractable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_url: Option<String>,

    /// SAFER carrier-lookup URL, when extractable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safer_url: Option<String>,

    /// Pickup timestamp (ISO-8601 or verbatim provider token).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_at: Option<String>,

    /// Delivery timestamp (ISO-8601 or verbatim provider token).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliver_by: Option<String>,

    /// Posting expiry timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,

    /// Piece count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pieces: Option<u32>,

    /// Poster's days-to-pay from credit history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_days_to_pay: Option<u32>,

    /// Raw extracted fields in the legacy shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy: Option<Value>,
}

// ============================================================================
// Load
// ============================================================================

/// One normalized freight posting returned by a provider for a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Load {
    /// Stable load identifier (provider order number or synthesized).
    pub id: LoadId,

    /// Posting timestamp (ISO-8601 or verbatim provider token).
    #[serde(default)]
    pub posted_at: String,

    /// Pickup location.
    #[serde(default)]
    pub origin: Location,

    /// Delivery location.
    #[serde(default)]
    pub destination: Location,

    /// Posting contact.
    #[serde(default)]
    pub contact: Contact,

    /// Offered rate in dollars (0 when unlisted).
    #[serde(default)]
    pub rate: f64,

    /// Free-text comment.
    #[serde(default)]
    pub comment: String,

    /// Equipment/vehicle type label.
    #[serde(default)]
    pub equipment_type: String,

    /// Trip miles.
    #[serde(default)]
    pub miles: u32,

    /// Weight in pounds.
    #[serde(default)]
    pub weight: u32,

    /// Full/partial load indicator.
    #[serde(default)]
    pub full_partial: String,

    /// Deadhead miles to the pickup.
    #[serde(default)]
    pub deadhead_miles: u32,

    /// Poster credit score, when both credit links were present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_score: Option<u32>,

    /// Provider that produced this load.
    pub source: Provider,

    /// Search this load belongs to.
    pub search_module_id: SearchModuleId,

    /// Provider-specific passthrough fields.
    #[serde(flatten)]
    pub extras: LoadExtras,
}

// ============================================================================
// SearchCriteria
// ============================================================================

/// Provider-agnostic search parameters, before an ID is assigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    /// Origin place filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Location>,

    /// Destination place filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Location>,

    /// Date range start (ISO date), nullable.
    #[serde(default)]
    pub date_start: Option<String>,

    /// Date range end (ISO date), nullable.
    #[serde(default)]
    pub date_end: Option<String>,

    /// Origin state codes.
    #[serde(default)]
    pub origin_states: Vec<String>,

    /// Destination state codes.
    #[serde(default)]
    pub destination_states: Vec<String>,
}

// ============================================================================
// SearchRequest
// ============================================================================

/// A provider-agnostic search request.
///
/// The [`SearchModuleId`] is assigned once per logical search and
/// threaded unchanged through every provider request, result, and the
/// Lane derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Search parameters.
    #[serde(flatten)]
    pub criteria: SearchCriteria,

    /// Correlation identifier for this logical search.
    pub search_module_id: SearchModuleId,
}

impl SearchRequest {
    /// Creates a request with a freshly generated search module ID.
    #[must_use]
    pub fn new(criteria: SearchCriteria) -> Self {
        Self {
            criteria,
            search_module_id: SearchModuleId::generate(),
        }
    }

    /// Creates a request with a specific search module ID.
    #[inline]
    #[must_use]
    pub fn with_id(criteria: SearchCriteria, search_module_id: SearchModuleId) -> Self {
        Self {
            criteria,
            search_module_id,
        }
    }
}

// ============================================================================
// ResultPayload
// ============================================================================

/// Payload of a successful search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    /// Search this result belongs to.
    pub search_module_id: SearchModuleId,

    /// Capture timestamp (RFC 3339).
    pub timestamp: String,

    /// Provider that produced the result.
    pub provider: Provider,

    /// `"simulation"` when synthesized without a live extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// Provider-side query identifier, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,

    /// Search criteria the result was produced for.
    #[serde(default)]
    pub criteria: Value,

    /// Raw provider payload, passed through unmodified.
    #[serde(default)]
    pub raw: Value,

    /// Normalized loads.
    #[serde(default)]
    pub loads: Vec<Load>,
}

impl ResultPayload {
    /// Returns `true` if this payload was synthesized without a live
    /// extension.
    #[inline]
    #[must_use]
    pub fn is_simulation(&self) -> bool {
        self.mode.as_deref() == Some("simulation")
    }
}

// ============================================================================
// SearchResult
// ============================================================================

/// Outcome of one provider search invocation.
///
/// Adapters never throw past their boundary: failures arrive here as
/// `success == false` with a message, so downstream code only branches
/// on `success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Whether the search produced a payload.
    pub success: bool,

    /// Failure (or advisory) message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Result payload, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResultPayload>,
}

impl SearchResult {
    /// Creates a success result.
    #[inline]
    #[must_use]
    pub fn success(data: ResultPayload) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// Creates a failure result.
    #[inline]
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Returns the payload's search module ID, when present.
    #[inline]
    #[must_use]
    pub fn search_module_id(&self) -> Option<&SearchModuleId> {
        self.data.as_ref().map(|d| &d.search_module_id)
    }

    /// Returns the payload's capture timestamp, when present.
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.timestamp.as_str())
    }
}

// ============================================================================
// Lane
// ============================================================================

/// A durable, user-visible search aggregate.
///
/// Created on the first successful result for a new search (or manually
/// by a user), updated on every subsequent result bearing a matching
/// identifier, never auto-deleted. `driver_ids` is owned by explicit
/// driver-assignment operations and survives every refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lane {
    /// Stable lane identifier.
    pub id: LaneId,

    /// Origin display string (`"City, ST"`).
    #[serde(default)]
    pub origin: String,

    /// Destination display string (`"City, ST"`).
    #[serde(default)]
    pub destination: String,

    /// `[start, end]` ISO dates, each nullable.
    #[serde(default)]
    pub date_range: [Option<String>; 2],

    /// Weight filter display string.
    #[serde(default)]
    pub weight: String,

    /// Assigned driver IDs. Never overwritten by a refresh.
    #[serde(default)]
    pub driver_ids: Vec<String>,

    /// Provider that first produced this lane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Provider>,

    /// DAT-side query identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dat_query_id: Option<String>,

    /// Sylectus-side query identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sylectus_query_id: Option<String>,

    /// Result count from the latest refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_count: Option<u64>,

    /// Timestamp of the latest refresh (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refreshed: Option<String>,

    /// Originating search, absent for legacy manual lanes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_module_id: Option<SearchModuleId>,
}

impl Lane {
    /// Creates a manual lane with a user-assigned ID.
    #[must_use]
    pub fn manual(id: LaneId, origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            id,
            origin: origin.into(),
            destination: destination.into(),
            date_range: [None, None],
            weight: String::new(),
            driver_ids: Vec::new(),
            source: None,
            dat_query_id: None,
            sylectus_query_id: None,
            results_count: None,
            last_refreshed: None,
            search_module_id: None,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Current wall-clock time as an RFC 3339 timestamp.
#[inline]
#[must_use]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn sample_load() -> Load {
        Load {
            id: LoadId::from_string("12345"),
            posted_at: "2025-08-04T14:00:00".to_string(),
            origin: Location {
                city: "Chicago".to_string(),
                state: "IL".to_string(),
                zip_code: Some("60601".to_string()),
                full_address: None,
            },
            destination: Location::new("Dallas", "TX"),
            contact: Contact {
                company: "Acme Logistics".to_string(),
                ..Contact::default()
            },
            rate: 1850.0,
            comment: String::new(),
            equipment_type: "SMALL STRAIGHT".to_string(),
            miles: 920,
            weight: 2400,
            full_partial: "FULL".to_string(),
            deadhead_miles: 0,
            credit_score: Some(97),
            source: Provider::Sylectus,
            search_module_id: SearchModuleId::from_string("SM_1_abc123"),
            extras: LoadExtras::default(),
        }
    }

    #[test]
    fn test_provider_wire_tags() {
        assert_eq!(
            serde_json::to_string(&Provider::Dat).expect("serialize"),
            "\"DAT\""
        );
        assert_eq!(
            serde_json::to_string(&Provider::Sylectus).expect("serialize"),
            "\"SYLECTUS\""
        );
    }

    #[test]
    fn test_load_wire_shape_is_camel_case() {
        let value = serde_json::to_value(sample_load()).expect("serialize");

        assert_eq!(value["postedAt"], "2025-08-04T14:00:00");
        assert_eq!(value["origin"]["zipCode"], "60601");
        assert_eq!(value["equipmentType"], "SMALL STRAIGHT");
        assert_eq!(value["searchModuleId"], "SM_1_abc123");
        assert_eq!(value["source"], "SYLECTUS");

        // Absent optionals are omitted, not null.
        assert!(value["destination"].get("zipCode").is_none());
        assert!(value.get("refNo").is_none());
    }

    #[test]
    fn test_load_roundtrip() {
        let load = sample_load();
        let json = serde_json::to_string(&load).expect("serialize");
        let back: Load = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, load);
    }

    #[test]
    fn test_search_request_assigns_id_once() {
        let request = SearchRequest::new(SearchCriteria::default());
        assert!(request.search_module_id.as_str().starts_with("SM_"));

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value["searchModuleId"],
            request.search_module_id.as_str()
        );
    }

    #[test]
    fn test_search_result_constructors() {
        let failure = SearchResult::failure("transport down");
        assert!(!failure.success);
        assert_eq!(failure.message.as_deref(), Some("transport down"));
        assert!(failure.search_module_id().is_none());

        let payload = ResultPayload {
            search_module_id: SearchModuleId::from_string("SM_1_x"),
            timestamp: now_rfc3339(),
            provider: Provider::Dat,
            mode: Some("simulation".to_string()),
            query_id: Some("mock_1".to_string()),
            criteria: json!({}),
            raw: json!({}),
            loads: Vec::new(),
        };
        assert!(payload.is_simulation());

        let success = SearchResult::success(payload);
        assert!(success.success);
        assert_eq!(
            success.search_module_id().map(|id| id.as_str()),
            Some("SM_1_x")
        );
    }

    #[test]
    fn test_lane_parses_with_missing_optionals() {
        let lane: Lane = serde_json::from_value(json!({
            "id": "manual-1",
            "origin": "Chicago, IL",
            "destination": "Dallas, TX"
        }))
        .expect("parse");

        assert_eq!(lane.id.as_str(), "manual-1");
        assert_eq!(lane.date_range, [None, None]);
        assert!(lane.driver_ids.is_empty());
        assert!(lane.search_module_id.is_none());
    }
}
