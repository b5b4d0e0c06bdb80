//! DAT provider adapter.
//!
//! Translates a [`SearchRequest`] into the `DAT_SEARCH` wire shape, sends
//! it through the bridge, and normalizes the response. The adapter trusts
//! the extension's payload shape for the match data and passes it through
//! on `raw`, annotating the result with the search module ID, provider
//! tag, and a capture timestamp.
//!
//! On transport failure the adapter falls back to a simulated result (see
//! the [module docs](crate::provider)); every other failure folds into
//! `SearchResult { success: false }`.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::Result;
use crate::identifiers::{LoadId, SearchModuleId};
use crate::model::{
    Contact, Load, LoadExtras, Location, Provider, ResultPayload, SearchRequest, SearchResult,
    now_rfc3339,
};
use crate::protocol::OutboundMessage;
use crate::transport::ExtensionBridge;

use super::{AdapterConfig, simulated_payload};

// ============================================================================
// Results Count
// ============================================================================

/// Resolves the DAT results count from an unstable raw payload.
///
/// The provider's payload shape is not contractually stable across
/// response variants; the precedence below is inferred from the observed
/// fallback paths and preserved as a documented assumption:
///
/// 1. `matchCounts.totalCount`
/// 2. `matches` array length
/// 3. top-level `resultsFound`
/// 4. zero
#[must_use]
pub fn dat_results_count(raw: &Value) -> u64 {
    if let Some(total) = raw
        .get("matchCounts")
        .and_then(|v| v.get("totalCount"))
        .and_then(|v| v.as_u64())
    {
        return total;
    }

    if let Some(matches) = raw.get("matches").and_then(|v| v.as_array()) {
        return matches.len() as u64;
    }

    raw.get("resultsFound")
        .and_then(|v| v.as_u64())
        .unwrap_or_default()
}

// ============================================================================
// DatAdapter
// ============================================================================

/// Adapter for the DAT load board.
pub struct DatAdapter {
    /// Transport to the extension.
    bridge: Arc<ExtensionBridge>,
    /// Timing configuration.
    config: AdapterConfig,
}

impl DatAdapter {
    /// Creates an adapter over the given bridge.
    #[must_use]
    pub fn new(bridge: Arc<ExtensionBridge>, config: AdapterConfig) -> Self {
        Self { bridge, config }
    }

    /// Runs one DAT search.
    ///
    /// Never returns an error: transport failures fall back to a
    /// simulated result after the configured delay, everything else folds
    /// into `success: false`.
    pub async fn search(&self, request: &SearchRequest) -> SearchResult {
        match self.try_search(request).await {
            Ok(result) => result,
            Err(err) if err.is_transport_error() => {
                debug!(
                    search_module_id = %request.search_module_id,
                    error = %err,
                    "DAT transport failed, returning simulated result"
                );
                sleep(self.config.simulation_delay).await;
                SearchResult::success(simulated_payload(Provider::Dat, request))
            }
            Err(err) => {
                warn!(
                    search_module_id = %request.search_module_id,
                    error = %err,
                    "DAT search failed"
                );
                SearchResult::failure(err.to_string())
            }
        }
    }

    /// Builds, sends, and normalizes one DAT search.
    async fn try_search(&self, request: &SearchRequest) -> Result<SearchResult> {
        let params = serde_json::to_value(request)?;
        let response = self
            .bridge
            .send(OutboundMessage::dat_search(params.clone()))
            .await?;

        if !response.get_bool("success") {
            let message = response
                .error_message()
                .unwrap_or_else(|| "DAT search rejected".to_string());
            warn!(search_module_id = %request.search_module_id, message = %message, "DAT rejected search");
            return Ok(SearchResult::failure(message));
        }

        let raw = response.into_value();
        let query_id = raw
            .get("queryId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let loads = raw
            .get("loads")
            .or_else(|| raw.get("matches"))
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .map(|v| dat_load_from_value(v, &request.search_module_id))
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            search_module_id = %request.search_module_id,
            results = dat_results_count(&raw),
            "DAT search completed"
        );

        Ok(SearchResult::success(ResultPayload {
            search_module_id: request.search_module_id.clone(),
            timestamp: now_rfc3339(),
            provider: Provider::Dat,
            mode: None,
            query_id,
            criteria: params,
            raw,
            loads,
        }))
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// First string found under any of the given keys, else empty.
fn str_at(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .unwrap_or_default()
        .to_string()
}

/// First unsigned integer found under any of the given keys, else zero.
fn u64_at(value: &Value, keys: &[&str]) -> u64 {
    keys.iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_u64()))
        .unwrap_or_default()
}

/// Tolerantly maps one raw DAT match object into a normalized [`Load`].
///
/// The raw shape is not stable; every field defaults rather than fails.
/// Shared with the push-event ingest path, which receives the same match
/// objects unsolicited.
pub(crate) fn dat_load_from_value(value: &Value, search_module_id: &SearchModuleId) -> Load {
    let id = {
        let raw_id = str_at(value, &["id", "matchId", "postingId"]);
        if raw_id.is_empty() {
            LoadId::synthesize()
        } else {
            LoadId::from_string(raw_id)
        }
    };

    let place = |key: &str| -> Location {
        let node = value.get(key).cloned().unwrap_or(Value::Null);
        Location {
            city: str_at(&node, &["city"]),
            state: str_at(&node, &["state", "stateProv"]),
            zip_code: node
                .get("zip")
                .or_else(|| node.get("postalCode"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            full_address: None,
        }
    };

    let contact_node = value.get("contact").cloned().unwrap_or(Value::Null);
    let contact = Contact {
        company: {
            let company = str_at(value, &["company", "companyName"]);
            if company.is_empty() {
                str_at(&contact_node, &["company", "companyName"])
            } else {
                company
            }
        },
        name: str_at(&contact_node, &["name"]),
        phone: contact_node
            .get("phone")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        email: contact_node
            .get("email")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    };

    Load {
        id,
        posted_at: str_at(value, &["postedAt", "posted"]),
        origin: place("origin"),
        destination: place("destination"),
        contact,
        rate: value.get("rate").and_then(|v| v.as_f64()).unwrap_or_default(),
        comment: str_at(value, &["comment", "comments"]),
        equipment_type: str_at(value, &["equipmentType", "equipment"]),
        miles: u64_at(value, &["miles", "tripMiles"]) as u32,
        weight: u64_at(value, &["weight", "weightPounds"]) as u32,
        full_partial: str_at(value, &["fullPartial"]),
        deadhead_miles: u64_at(value, &["deadheadMiles", "originDeadheadMiles"]) as u32,
        credit_score: value
            .get("creditScore")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32),
        source: Provider::Dat,
        search_module_id: search_module_id.clone(),
        extras: LoadExtras {
            ref_no: value
                .get("refNo")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            pickup_at: value
                .get("pickupAt")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            deliver_by: value
                .get("deliverBy")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            ..LoadExtras::default()
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;

    use crate::model::SearchCriteria;
    use crate::transport::BridgeConfig;
    use crate::transport::channel::testing::{ScriptedDirect, ScriptedReply, init_tracing};

    fn fast_adapter(direct: Arc<ScriptedDirect>) -> DatAdapter {
        init_tracing();
        let bridge = Arc::new(
            ExtensionBridge::new(BridgeConfig {
                broadcast_timeout: Duration::from_millis(20),
            })
            .with_direct(direct),
        );
        DatAdapter::new(
            bridge,
            AdapterConfig {
                simulation_delay: Duration::from_millis(1),
            },
        )
    }

    #[test]
    fn test_results_count_precedence() {
        // matchCounts.totalCount wins over everything.
        let raw = json!({
            "matchCounts": { "totalCount": 7 },
            "matches": [1, 2],
            "resultsFound": 99
        });
        assert_eq!(dat_results_count(&raw), 7);

        // Then matches length.
        let raw = json!({ "matches": [1, 2, 3], "resultsFound": 99 });
        assert_eq!(dat_results_count(&raw), 3);

        // Then resultsFound.
        let raw = json!({ "resultsFound": 5 });
        assert_eq!(dat_results_count(&raw), 5);

        // Then zero.
        assert_eq!(dat_results_count(&json!({})), 0);
    }

    #[tokio::test]
    async fn test_successful_search_annotates_payload() {
        let direct = ScriptedDirect::new();
        direct.script(
            "DAT_SEARCH",
            ScriptedReply::Value(json!({
                "success": true,
                "queryId": "q-77",
                "loads": [
                    {
                        "id": "m-1",
                        "origin": { "city": "Chicago", "state": "IL" },
                        "destination": { "city": "Dallas", "state": "TX" },
                        "rate": 1850.0,
                        "miles": 920,
                        "company": "Acme Logistics"
                    }
                ],
                "matchCounts": { "totalCount": 1 }
            })),
        );

        let adapter = fast_adapter(direct);
        let request = SearchRequest::new(SearchCriteria::default());
        let result = adapter.search(&request).await;

        assert!(result.success);
        let data = result.data.expect("payload");
        assert!(!data.is_simulation());
        assert_eq!(data.provider, Provider::Dat);
        assert_eq!(data.search_module_id, request.search_module_id);
        assert_eq!(data.query_id.as_deref(), Some("q-77"));
        assert_eq!(data.loads.len(), 1);

        let load = &data.loads[0];
        assert_eq!(load.id.as_str(), "m-1");
        assert_eq!(load.origin.city, "Chicago");
        assert_eq!(load.contact.company, "Acme Logistics");
        assert_eq!(load.search_module_id, request.search_module_id);
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_to_simulation() {
        // Nothing scripted and no broadcast channel: ChannelUnavailable.
        let adapter = fast_adapter(ScriptedDirect::new());
        let request = SearchRequest::new(SearchCriteria::default());
        let result = adapter.search(&request).await;

        assert!(result.success);
        let data = result.data.expect("payload");
        assert!(data.is_simulation());
        assert!(data.loads.is_empty());
        assert_eq!(data.search_module_id, request.search_module_id);
    }

    #[tokio::test]
    async fn test_rejected_delivery_also_simulates() {
        let direct = ScriptedDirect::new();
        direct.script("DAT_SEARCH", ScriptedReply::Rejected);

        let adapter = fast_adapter(direct);
        let result = adapter.search(&SearchRequest::new(SearchCriteria::default())).await;

        assert!(result.success);
        assert!(result.data.expect("payload").is_simulation());
    }

    #[tokio::test]
    async fn test_provider_rejection_is_failure_not_simulation() {
        let direct = ScriptedDirect::new();
        direct.script(
            "DAT_SEARCH",
            ScriptedReply::Value(json!({
                "success": false,
                "error": "session expired"
            })),
        );

        let adapter = fast_adapter(direct);
        let result = adapter.search(&SearchRequest::new(SearchCriteria::default())).await;

        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("session expired"));
        assert!(result.data.is_none());
    }

    #[tokio::test]
    async fn test_load_defaults_when_fields_absent() {
        let direct = ScriptedDirect::new();
        direct.script(
            "DAT_SEARCH",
            ScriptedReply::Value(json!({
                "success": true,
                "matches": [{}]
            })),
        );

        let adapter = fast_adapter(direct);
        let result = adapter.search(&SearchRequest::new(SearchCriteria::default())).await;

        let data = result.data.expect("payload");
        let load = &data.loads[0];
        assert!(!load.id.is_empty(), "id must be synthesized");
        assert_eq!(load.rate, 0.0);
        assert_eq!(load.miles, 0);
        assert!(load.origin.is_empty());
    }
}
