//! Push event message types.
//!
//! Push events are unsolicited notifications from the extension: they are
//! not correlated to any outstanding request and are dispatched by `type`
//! to at most one registered callback per event family.
//!
//! # Event Types
//!
//! | Family | Events |
//! |--------|--------|
//! | `ExtensionDetected` | `EXTENSION_DETECTED` |
//! | `TabConnection` | `DAT_TAB_CONNECTED`, `DAT_TAB_DISCONNECTED` |
//! | `DatLoads` | `DAT_LOADS_RECEIVED` |
//! | `DatFindings` | `DAT_SEARCH_FINDINGS` |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// EventFamily
// ============================================================================

/// Grouping key for push-event subscriptions.
///
/// Each family holds at most one registered callback (replace on
/// register, explicit unregister).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFamily {
    /// Extension announced itself.
    ExtensionDetected,
    /// DAT tab bridged or unbridged.
    TabConnection,
    /// Unsolicited DAT load batch.
    DatLoads,
    /// Unsolicited DAT search findings.
    DatFindings,
}

// ============================================================================
// PushEvent
// ============================================================================

/// An unsolicited notification from the extension.
///
/// # Format
///
/// ```json
/// {
///   "type": "DAT_LOADS_RECEIVED",
///   "queryId": "...",
///   "loads": [ ... ],
///   "matchCount": 12
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    /// Event type discriminator.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event-specific data.
    #[serde(flatten)]
    pub params: Value,
}

impl PushEvent {
    /// Creates an event from its type and params.
    #[inline]
    #[must_use]
    pub fn new(event_type: impl Into<String>, params: Value) -> Self {
        Self {
            event_type: event_type.into(),
            params,
        }
    }

    /// Returns the subscription family for this event, if recognized.
    #[must_use]
    pub fn family(&self) -> Option<EventFamily> {
        match self.event_type.as_str() {
            "EXTENSION_DETECTED" => Some(EventFamily::ExtensionDetected),
            "DAT_TAB_CONNECTED" | "DAT_TAB_DISCONNECTED" => Some(EventFamily::TabConnection),
            "DAT_LOADS_RECEIVED" => Some(EventFamily::DatLoads),
            "DAT_SEARCH_FINDINGS" => Some(EventFamily::DatFindings),
            _ => None,
        }
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        match self.event_type.as_str() {
            "EXTENSION_DETECTED" => ParsedEvent::ExtensionDetected {
                version: self.get_optional_string("version"),
            },

            "DAT_TAB_CONNECTED" => ParsedEvent::DatTabConnected,

            "DAT_TAB_DISCONNECTED" => ParsedEvent::DatTabDisconnected,

            "DAT_LOADS_RECEIVED" => ParsedEvent::DatLoadsReceived {
                query_id: self.get_string("queryId"),
                loads: self
                    .params
                    .get("loads")
                    .and_then(|v| v.as_array())
                    .cloned()
                    .unwrap_or_default(),
                match_count: self.get_u64("matchCount"),
                timestamp: self.get_string("timestamp"),
                provider: self.get_string("provider"),
            },

            "DAT_SEARCH_FINDINGS" => ParsedEvent::DatSearchFindings {
                lane_id: self.get_string("laneId"),
                findings: self.params.get("findings").cloned().unwrap_or(Value::Null),
            },

            _ => ParsedEvent::Unknown {
                event_type: self.event_type.clone(),
                params: self.params.clone(),
            },
        }
    }

    /// Gets a string from params.
    #[inline]
    fn get_string(&self, key: &str) -> String {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Gets an optional string from params.
    #[inline]
    fn get_optional_string(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Gets a u64 from params.
    #[inline]
    fn get_u64(&self, key: &str) -> u64 {
        self.params
            .get(key)
            .and_then(|v| v.as_u64())
            .unwrap_or_default()
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed push events for type-safe handling.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// Extension announced itself on the page.
    ExtensionDetected {
        /// Extension version string, when reported.
        version: Option<String>,
    },

    /// A DAT browser tab is now bridged.
    DatTabConnected,

    /// The bridged DAT tab went away.
    DatTabDisconnected,

    /// Unsolicited batch of DAT loads.
    DatLoadsReceived {
        /// Provider query ID the batch belongs to.
        query_id: String,
        /// Raw load objects (normalized later by the adapter).
        loads: Vec<Value>,
        /// Provider-reported match count.
        match_count: u64,
        /// Capture timestamp.
        timestamp: String,
        /// Provider tag.
        provider: String,
    },

    /// Unsolicited DAT search findings for a lane.
    DatSearchFindings {
        /// Lane the findings belong to.
        lane_id: String,
        /// Raw findings body (`matches`, `matchCounts`, `timestamp`, `provider`).
        findings: Value,
    },

    /// Unknown event type.
    Unknown {
        /// Event type discriminator.
        event_type: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_family_mapping() {
        let cases = [
            ("EXTENSION_DETECTED", Some(EventFamily::ExtensionDetected)),
            ("DAT_TAB_CONNECTED", Some(EventFamily::TabConnection)),
            ("DAT_TAB_DISCONNECTED", Some(EventFamily::TabConnection)),
            ("DAT_LOADS_RECEIVED", Some(EventFamily::DatLoads)),
            ("DAT_SEARCH_FINDINGS", Some(EventFamily::DatFindings)),
            ("SOMETHING_ELSE", None),
        ];

        for (event_type, family) in cases {
            let event = PushEvent::new(event_type, json!({}));
            assert_eq!(event.family(), family, "{event_type}");
        }
    }

    #[test]
    fn test_loads_received_parsing() {
        let json_str = r#"{
            "type": "DAT_LOADS_RECEIVED",
            "queryId": "q-123",
            "loads": [{"id": "a"}, {"id": "b"}],
            "matchCount": 2,
            "timestamp": "2025-08-04T14:00:00Z",
            "provider": "DAT"
        }"#;

        let event: PushEvent = serde_json::from_str(json_str).expect("parse event");
        match event.parse() {
            ParsedEvent::DatLoadsReceived {
                query_id,
                loads,
                match_count,
                provider,
                ..
            } => {
                assert_eq!(query_id, "q-123");
                assert_eq!(loads.len(), 2);
                assert_eq!(match_count, 2);
                assert_eq!(provider, "DAT");
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_search_findings_parsing() {
        let event = PushEvent::new(
            "DAT_SEARCH_FINDINGS",
            json!({
                "laneId": "SM_1_abc123",
                "findings": {
                    "matches": [],
                    "matchCounts": { "totalCount": 0 }
                }
            }),
        );

        match event.parse() {
            ParsedEvent::DatSearchFindings { lane_id, findings } => {
                assert_eq!(lane_id, "SM_1_abc123");
                assert!(findings.get("matchCounts").is_some());
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_tab_events_parse_to_unit_variants() {
        let connected = PushEvent::new("DAT_TAB_CONNECTED", json!({}));
        assert!(matches!(connected.parse(), ParsedEvent::DatTabConnected));

        let disconnected = PushEvent::new("DAT_TAB_DISCONNECTED", json!({}));
        assert!(matches!(
            disconnected.parse(),
            ParsedEvent::DatTabDisconnected
        ));
    }

    #[test]
    fn test_unknown_event() {
        let event = PushEvent::new("CUSTOM_EVENT", json!({ "foo": "bar" }));
        match event.parse() {
            ParsedEvent::Unknown { event_type, .. } => {
                assert_eq!(event_type, "CUSTOM_EVENT");
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
    }
}
