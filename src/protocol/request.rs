//! Outbound message, response, and broadcast envelope types.
//!
//! Defines the message format for requests from the page to the extension
//! and the loosely-shaped responses coming back.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// Fixed `target` marker attached to broadcast requests.
///
/// The extension's content script only picks up window-scoped messages
/// addressed to this marker.
pub const BROADCAST_TARGET: &str = "loadboard-bridge-extension";

/// Fixed `source` marker the extension echoes on broadcast responses.
///
/// The correlation filter only accepts events carrying this marker.
pub const BROADCAST_SOURCE: &str = "loadboard-bridge-extension";

// ============================================================================
// MessageType
// ============================================================================

/// Request type discriminator.
///
/// Serialized as the wire `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Liveness probe.
    ConnectionCheck,
    /// Manual DAT tab diagnostic.
    PingDatTab,
    /// DAT provider search.
    DatSearch,
    /// Sylectus provider search.
    SylectusSearch,
}

impl MessageType {
    /// Returns the wire string for this type.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionCheck => "CONNECTION_CHECK",
            Self::PingDatTab => "PING_DAT_TAB",
            Self::DatSearch => "DAT_SEARCH",
            Self::SylectusSearch => "SYLECTUS_SEARCH",
        }
    }
}

// ============================================================================
// OutboundMessage
// ============================================================================

/// A command request from the page to the extension.
///
/// # Format
///
/// ```json
/// {
///   "type": "DAT_SEARCH",
///   "params": { ... }
/// }
/// ```
///
/// No schema is enforced beyond `type`; `params` carries whatever the
/// provider adapter built.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    /// Request type used for routing inside the extension.
    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// Request payload (provider-specific, loosely shaped).
    #[serde(flatten)]
    pub payload: Value,
}

impl OutboundMessage {
    /// Creates a message with a payload object.
    ///
    /// Non-object payloads are wrapped under a `params` key so the
    /// flattened envelope stays a JSON object.
    #[must_use]
    pub fn new(message_type: MessageType, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(_) => payload,
            Value::Null => Value::Object(Map::new()),
            other => json!({ "params": other }),
        };

        Self {
            message_type,
            payload,
        }
    }

    /// Creates a `CONNECTION_CHECK` probe.
    #[inline]
    #[must_use]
    pub fn connection_check() -> Self {
        Self::new(MessageType::ConnectionCheck, Value::Null)
    }

    /// Creates a `PING_DAT_TAB` diagnostic.
    #[inline]
    #[must_use]
    pub fn ping_dat_tab() -> Self {
        Self::new(MessageType::PingDatTab, Value::Null)
    }

    /// Creates a `DAT_SEARCH` request.
    #[inline]
    #[must_use]
    pub fn dat_search(params: Value) -> Self {
        Self::new(MessageType::DatSearch, json!({ "params": params }))
    }

    /// Creates a `SYLECTUS_SEARCH` request.
    #[inline]
    #[must_use]
    pub fn sylectus_search(params: Value) -> Self {
        Self::new(MessageType::SylectusSearch, json!({ "params": params }))
    }

    /// Wraps this message in the broadcast envelope.
    ///
    /// Adds the fixed `target` marker and the correlation `requestId` the
    /// fallback channel requires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the message fails to serialize.
    pub fn into_broadcast(self, request_id: RequestId) -> Result<Value> {
        let mut envelope = match serde_json::to_value(&self)? {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("params".to_string(), other);
                map
            }
        };

        envelope.insert("target".to_string(), json!(BROADCAST_TARGET));
        envelope.insert("requestId".to_string(), serde_json::to_value(request_id)?);

        Ok(Value::Object(envelope))
    }
}

// ============================================================================
// ExtensionResponse
// ============================================================================

/// A response from the extension.
///
/// Responses carry no fixed schema; this wrapper provides tolerant typed
/// accessors over the raw JSON, defaulting on absent or mistyped keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct ExtensionResponse(Value);

impl ExtensionResponse {
    /// Wraps a raw JSON value.
    #[inline]
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the raw JSON value.
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Borrows the raw JSON value.
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Gets a string value.
    ///
    /// Returns empty string if key not found or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.0
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Gets a u64 value.
    ///
    /// Returns 0 if key not found or not a number.
    #[inline]
    #[must_use]
    pub fn get_u64(&self, key: &str) -> u64 {
        self.0.get(key).and_then(|v| v.as_u64()).unwrap_or_default()
    }

    /// Gets a boolean value.
    ///
    /// Returns false if key not found or not a boolean.
    #[inline]
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.0
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or_default()
    }

    /// Returns the extension-reported error message, if any.
    #[inline]
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.0
            .get("error")
            .or_else(|| self.0.get("message"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

// ============================================================================
// BroadcastFrame
// ============================================================================

/// An incoming frame on the broadcast channel.
///
/// # Format
///
/// ```json
/// {
///   "source": "loadboard-bridge-extension",
///   "requestId": "uuid",
///   "type": "DAT_LOADS_RECEIVED",
///   ...
/// }
/// ```
///
/// Frames with a `requestId` matching a pending request resolve that
/// request; frames without one are dispatched as push events by `type`.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastFrame {
    /// Source marker echoed by the extension.
    #[serde(default)]
    pub source: Option<String>,

    /// Correlation key for request/response pairing.
    #[serde(rename = "requestId", default)]
    pub request_id: Option<RequestId>,

    /// Event type for uncorrelated push frames.
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,

    /// Remaining frame body.
    #[serde(flatten)]
    pub body: Value,
}

impl BroadcastFrame {
    /// Returns `true` if this frame carries the recognized source marker.
    #[inline]
    #[must_use]
    pub fn is_from_extension(&self) -> bool {
        self.source.as_deref() == Some(BROADCAST_SOURCE)
    }

    /// Returns `true` if this frame correlates to the given request.
    #[inline]
    #[must_use]
    pub fn matches(&self, request_id: RequestId) -> bool {
        self.is_from_extension() && self.request_id == Some(request_id)
    }

    /// Parses a frame from a raw JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the value is not an object-shaped frame.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(Error::Json)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_wire_strings() {
        assert_eq!(MessageType::ConnectionCheck.as_str(), "CONNECTION_CHECK");
        assert_eq!(MessageType::PingDatTab.as_str(), "PING_DAT_TAB");
        assert_eq!(MessageType::DatSearch.as_str(), "DAT_SEARCH");
        assert_eq!(MessageType::SylectusSearch.as_str(), "SYLECTUS_SEARCH");

        let json = serde_json::to_string(&MessageType::DatSearch).expect("serialize");
        assert_eq!(json, "\"DAT_SEARCH\"");
    }

    #[test]
    fn test_outbound_serialization() {
        let message = OutboundMessage::dat_search(json!({ "origin": "Chicago, IL" }));
        let value = serde_json::to_value(&message).expect("serialize");

        assert_eq!(value["type"], "DAT_SEARCH");
        assert_eq!(value["params"]["origin"], "Chicago, IL");
    }

    #[test]
    fn test_connection_check_is_bare() {
        let value =
            serde_json::to_value(OutboundMessage::connection_check()).expect("serialize");
        assert_eq!(value["type"], "CONNECTION_CHECK");
    }

    #[test]
    fn test_broadcast_envelope_fields() {
        let request_id = RequestId::generate();
        let envelope = OutboundMessage::sylectus_search(json!({}))
            .into_broadcast(request_id)
            .expect("envelope");

        assert_eq!(envelope["target"], BROADCAST_TARGET);
        assert_eq!(envelope["type"], "SYLECTUS_SEARCH");
        assert_eq!(
            envelope["requestId"],
            serde_json::to_value(request_id).expect("id")
        );
    }

    #[test]
    fn test_response_helpers() {
        let response = ExtensionResponse::new(json!({
            "connected": true,
            "message": "ok",
            "matchCount": 42
        }));

        assert!(response.get_bool("connected"));
        assert_eq!(response.get_string("message"), "ok");
        assert_eq!(response.get_u64("matchCount"), 42);

        // Missing keys return defaults
        assert!(!response.get_bool("missing"));
        assert_eq!(response.get_string("missing"), "");
        assert_eq!(response.get_u64("missing"), 0);
    }

    #[test]
    fn test_frame_correlation_match() {
        let request_id = RequestId::generate();
        let frame = BroadcastFrame::from_value(json!({
            "source": BROADCAST_SOURCE,
            "requestId": request_id,
            "success": true
        }))
        .expect("frame");

        assert!(frame.is_from_extension());
        assert!(frame.matches(request_id));
        assert!(!frame.matches(RequestId::generate()));
    }

    #[test]
    fn test_frame_rejects_foreign_source() {
        let request_id = RequestId::generate();
        let frame = BroadcastFrame::from_value(json!({
            "source": "someone-else",
            "requestId": request_id
        }))
        .expect("frame");

        assert!(!frame.is_from_extension());
        assert!(!frame.matches(request_id));
    }

    #[test]
    fn test_push_frame_has_no_request_id() {
        let frame = BroadcastFrame::from_value(json!({
            "source": BROADCAST_SOURCE,
            "type": "DAT_TAB_CONNECTED"
        }))
        .expect("frame");

        assert!(frame.request_id.is_none());
        assert_eq!(frame.event_type.as_deref(), Some("DAT_TAB_CONNECTED"));
    }
}
