//! Sylectus provider adapter.
//!
//! Sends a `SYLECTUS_SEARCH` through the bridge, then parses the
//! server-rendered HTML results table the extension captured into
//! normalized loads via the [`extract`] module. Transport failures fall
//! back to a simulated result; every other failure folds into
//! `SearchResult { success: false }` (see the
//! [module docs](crate::provider)).

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{Provider, ResultPayload, SearchRequest, SearchResult, now_rfc3339};
use crate::protocol::OutboundMessage;
use crate::transport::ExtensionBridge;

use super::{AdapterConfig, simulated_payload};

// ============================================================================
// Submodules
// ============================================================================

/// HTML Load Extractor for the results table.
pub mod extract;

/// Field-level parsing helpers.
pub mod fields;

// ============================================================================
// SylectusAdapter
// ============================================================================

/// Adapter for the Sylectus load board.
pub struct SylectusAdapter {
    /// Transport to the extension.
    bridge: Arc<ExtensionBridge>,
    /// Timing configuration.
    config: AdapterConfig,
}

impl SylectusAdapter {
    /// Creates an adapter over the given bridge.
    #[must_use]
    pub fn new(bridge: Arc<ExtensionBridge>, config: AdapterConfig) -> Self {
        Self { bridge, config }
    }

    /// Runs one Sylectus search.
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
                    "Sylectus transport failed, returning simulated result"
                );
                sleep(self.config.simulation_delay).await;
                SearchResult::success(simulated_payload(Provider::Sylectus, request))
            }
            Err(err) => {
                warn!(
                    search_module_id = %request.search_module_id,
                    error = %err,
                    "Sylectus search failed"
                );
                SearchResult::failure(err.to_string())
            }
        }
    }

    /// Builds, sends, and extracts one Sylectus search.
    async fn try_search(&self, request: &SearchRequest) -> Result<SearchResult> {
        let params = serde_json::to_value(request)?;
        let response = self
            .bridge
            .send(OutboundMessage::sylectus_search(params.clone()))
            .await?;

        if !response.get_bool("success") {
            let message = response
                .error_message()
                .unwrap_or_else(|| "Sylectus search rejected".to_string());
            warn!(search_module_id = %request.search_module_id, message = %message, "Sylectus rejected search");
            return Ok(SearchResult::failure(message));
        }

        // The extension captures the rendered results table verbatim; all
        // structure comes out of the markup here.
        let html = response.get_string("html");
        let loads = extract::extract_loads(&html, &request.search_module_id);

        let raw = response.into_value();
        let query_id = raw
            .get("queryId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        debug!(
            search_module_id = %request.search_module_id,
            loads = loads.len(),
            "Sylectus search completed"
        );

        Ok(SearchResult::success(ResultPayload {
            search_module_id: request.search_module_id.clone(),
            timestamp: now_rfc3339(),
            provider: Provider::Sylectus,
            mode: None,
            query_id,
            criteria: params,
            raw,
            loads,
        }))
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

    fn fast_adapter(direct: Arc<ScriptedDirect>) -> SylectusAdapter {
        init_tracing();
        let bridge = Arc::new(
            ExtensionBridge::new(BridgeConfig {
                broadcast_timeout: Duration::from_millis(20),
            })
            .with_direct(direct),
        );
        SylectusAdapter::new(
            bridge,
            AdapterConfig {
                simulation_delay: Duration::from_millis(1),
            },
        )
    }

    const ONE_ROW_TABLE: &str = r##"
<table>
  <tr>
    <td><a href="/posting.asp?order_no=551001">551001</a></td>
    <td><a href="#" onclick="company_profile('1')">Acme Logistics</a></td>
    <td>$900</td>
    <td>Chicago, IL 60601</td>
    <td>Dallas, TX</td>
    <td>08/04/2025 14:00<br>08/06/2025</td>
    <td>ASAP</td>
    <td>SPRINTER<br>FULL</td>
    <td>Miles<br>920</td>
    <td>Weight<br>2,400</td>
  </tr>
</table>
"##;

    #[tokio::test]
    async fn test_successful_search_extracts_from_html() {
        let direct = ScriptedDirect::new();
        direct.script(
            "SYLECTUS_SEARCH",
            ScriptedReply::Value(json!({
                "success": true,
                "queryId": "syl-42",
                "html": ONE_ROW_TABLE
            })),
        );

        let adapter = fast_adapter(direct);
        let request = SearchRequest::new(SearchCriteria::default());
        let result = adapter.search(&request).await;

        assert!(result.success);
        let data = result.data.expect("payload");
        assert!(!data.is_simulation());
        assert_eq!(data.provider, Provider::Sylectus);
        assert_eq!(data.query_id.as_deref(), Some("syl-42"));
        assert_eq!(data.loads.len(), 1);

        let load = &data.loads[0];
        assert_eq!(load.id.as_str(), "551001");
        assert_eq!(load.contact.company, "Acme Logistics");
        assert_eq!(load.rate, 900.0);
        assert_eq!(load.miles, 920);
        assert_eq!(load.search_module_id, request.search_module_id);
    }

    #[tokio::test]
    async fn test_missing_html_yields_empty_success() {
        let direct = ScriptedDirect::new();
        direct.script(
            "SYLECTUS_SEARCH",
            ScriptedReply::Value(json!({ "success": true })),
        );

        let adapter = fast_adapter(direct);
        let result = adapter.search(&SearchRequest::new(SearchCriteria::default())).await;

        assert!(result.success);
        let data = result.data.expect("payload");
        assert!(!data.is_simulation());
        assert!(data.loads.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_to_simulation() {
        let adapter = fast_adapter(ScriptedDirect::new());
        let request = SearchRequest::new(SearchCriteria::default());
        let result = adapter.search(&request).await;

        assert!(result.success);
        let data = result.data.expect("payload");
        assert!(data.is_simulation());
        assert_eq!(data.provider, Provider::Sylectus);
        assert!(data.loads.is_empty());
    }

    #[tokio::test]
    async fn test_provider_rejection_is_failure() {
        let direct = ScriptedDirect::new();
        direct.script(
            "SYLECTUS_SEARCH",
            ScriptedReply::Value(json!({
                "success": false,
                "error": "not logged in"
            })),
        );

        let adapter = fast_adapter(direct);
        let result = adapter.search(&SearchRequest::new(SearchCriteria::default())).await;

        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("not logged in"));
    }
}
