//! Multi-provider search orchestration.
//!
//! One user-initiated search fans out to every provider concurrently
//! under a single freshly generated
//! [`SearchModuleId`](crate::identifiers::SearchModuleId). Provider
//! outcomes are isolated: a provider that fails (or falls back to
//! simulation) never blocks or invalidates its sibling. Each settled
//! result is recorded into the [`ResultStore`], and successful results
//! additionally refresh their [`Lane`](crate::model::Lane).

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::identifiers::SearchModuleId;
use crate::model::{
    Provider, ResultPayload, SearchCriteria, SearchRequest, SearchResult, now_rfc3339,
};
use crate::protocol::{EventFamily, ParsedEvent};
use crate::provider::dat::{dat_load_from_value, dat_results_count};
use crate::provider::{AdapterConfig, DatAdapter, SylectusAdapter};
use crate::store::{LaneReconciler, ResultStore};
use crate::transport::ExtensionBridge;

// ============================================================================
// AggregateOutcome
// ============================================================================

/// Settled per-provider outcomes of one aggregated search.
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    /// The ID assigned to this search, shared by both provider results.
    pub search_module_id: SearchModuleId,

    /// DAT outcome (live, simulated, or failed).
    pub dat: SearchResult,

    /// Sylectus outcome (live, simulated, or failed).
    pub sylectus: SearchResult,
}

impl AggregateOutcome {
    /// Returns `true` if at least one provider produced a payload.
    #[inline]
    #[must_use]
    pub fn any_success(&self) -> bool {
        self.dat.success || self.sylectus.success
    }
}

// ============================================================================
// SearchAggregator
// ============================================================================

/// Fans one search out to every provider and settles the results.
pub struct SearchAggregator {
    /// DAT adapter.
    dat: DatAdapter,
    /// Sylectus adapter.
    sylectus: SylectusAdapter,
    /// Result persistence.
    results: Arc<ResultStore>,
    /// Lane persistence.
    lanes: Arc<LaneReconciler>,
}

impl SearchAggregator {
    /// Creates an aggregator over one bridge and one persistence pair.
    #[must_use]
    pub fn new(
        bridge: Arc<ExtensionBridge>,
        config: AdapterConfig,
        results: Arc<ResultStore>,
        lanes: Arc<LaneReconciler>,
    ) -> Self {
        Self {
            dat: DatAdapter::new(bridge.clone(), config.clone()),
            sylectus: SylectusAdapter::new(bridge, config),
            results,
            lanes,
        }
    }

    /// Runs one search against every provider concurrently.
    ///
    /// Assigns a fresh search module ID, fires both providers, records
    /// each settled result, and refreshes lanes for the successful ones.
    /// Never returns an error: per-provider failures are carried in the
    /// outcome.
    pub async fn search_all(&self, criteria: SearchCriteria) -> AggregateOutcome {
        let request = SearchRequest::new(criteria);
        debug!(
            search_module_id = %request.search_module_id,
            "starting aggregated search"
        );

        let (dat, sylectus) = tokio::join!(
            self.dat.search(&request),
            self.sylectus.search(&request)
        );

        self.settle(&dat);
        self.settle(&sylectus);

        debug!(
            search_module_id = %request.search_module_id,
            dat_success = dat.success,
            sylectus_success = sylectus.success,
            "aggregated search settled"
        );

        AggregateOutcome {
            search_module_id: request.search_module_id,
            dat,
            sylectus,
        }
    }

    /// Subscribes the stores to push-delivered DAT results.
    ///
    /// DAT keeps a query running after the response settles and streams
    /// later result batches as unsolicited pushes. A findings push
    /// (`DAT_SEARCH_FINDINGS`) carries a lane ID and the same
    /// matches/counts shape as a live response: it upserts the stored
    /// result for that ID and refreshes the lane's count. A load batch
    /// push (`DAT_LOADS_RECEIVED`) carries only a query ID and refreshes
    /// the matching lane's count. Registration is single-slot per event
    /// family; calling this replaces any earlier subscriber.
    pub fn subscribe_push_results(&self, bridge: &ExtensionBridge) {
        let results = Arc::clone(&self.results);
        let lanes = Arc::clone(&self.lanes);
        bridge.on_event(
            EventFamily::DatFindings,
            Some(Box::new(move |event| {
                if let ParsedEvent::DatSearchFindings { lane_id, findings } = event.parse() {
                    ingest_findings(&results, &lanes, &lane_id, &findings);
                }
            })),
        );

        let lanes = Arc::clone(&self.lanes);
        bridge.on_event(
            EventFamily::DatLoads,
            Some(Box::new(move |event| {
                if let ParsedEvent::DatLoadsReceived {
                    query_id,
                    match_count,
                    timestamp,
                    ..
                } = event.parse()
                {
                    let timestamp = (!timestamp.is_empty()).then_some(timestamp);
                    match lanes.record_push_refresh(&query_id, match_count, timestamp) {
                        Ok(true) => debug!(query_id = %query_id, "load batch refreshed lane"),
                        Ok(false) => {}
                        Err(error) => warn!(%error, "failed to refresh lane from load batch"),
                    }
                }
            })),
        );
    }

    /// Records one settled result and refreshes its lane on success.
    ///
    /// Persistence failures are logged, never propagated: storage trouble
    /// must not turn a completed search into a failure.
    fn settle(&self, result: &SearchResult) {
        if let Err(error) = self.results.record(result) {
            warn!(%error, "failed to record search result");
        }
        if result.success {
            if let Err(error) = self.lanes.upsert_from_result(result) {
                warn!(%error, "failed to upsert lane from result");
            }
        }
    }
}

// ============================================================================
// Push Ingest
// ============================================================================

/// Folds one push-delivered findings frame into the stores.
///
/// The frame is treated as a DAT result for the named lane: the stored
/// result is upserted under that ID and the lane's count refreshed by the
/// documented count precedence. Pushes never create lanes; a frame naming
/// an unknown lane still records its result but refreshes nothing.
fn ingest_findings(
    results: &ResultStore,
    lanes: &LaneReconciler,
    lane_id: &str,
    findings: &Value,
) {
    if lane_id.is_empty() {
        warn!("dropping findings push without a lane id");
        return;
    }

    let search_module_id = SearchModuleId::from_string(lane_id);
    let timestamp = findings
        .get("timestamp")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(now_rfc3339);
    let loads = findings
        .get("matches")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .map(|v| dat_load_from_value(v, &search_module_id))
                .collect()
        })
        .unwrap_or_default();

    debug!(
        lane_id,
        results = dat_results_count(findings),
        "ingesting pushed findings"
    );

    let result = SearchResult::success(ResultPayload {
        search_module_id,
        timestamp: timestamp.clone(),
        provider: Provider::Dat,
        mode: None,
        query_id: findings
            .get("queryId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        criteria: Value::Null,
        raw: findings.clone(),
        loads,
    });

    if let Err(error) = results.record(&result) {
        warn!(%error, "failed to record pushed findings");
    }
    if let Err(error) =
        lanes.record_push_refresh(lane_id, dat_results_count(findings), Some(timestamp))
    {
        warn!(%error, "failed to refresh lane from pushed findings");
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

    use crate::protocol::PushEvent;
    use crate::store::{MemoryStore, StoreConfig};
    use crate::transport::BridgeConfig;
    use crate::transport::channel::testing::{ScriptedDirect, ScriptedReply, init_tracing};

    const SYLECTUS_TABLE: &str = r##"
<table>
  <tr>
    <td><a href="/posting.asp?order_no=551001">551001</a></td>
    <td><a href="#" onclick="company_profile('1')">Acme Logistics</a></td>
    <td>$900</td>
    <td>Chicago, IL 60601</td>
    <td>Dallas, TX</td>
    <td>08/04/2025 14:00</td>
    <td>ASAP</td>
    <td>SPRINTER<br>FULL</td>
    <td>Miles<br>920</td>
    <td>Weight<br>2,400</td>
  </tr>
</table>
"##;

    fn aggregator(direct: Arc<ScriptedDirect>) -> (Arc<ExtensionBridge>, SearchAggregator) {
        init_tracing();
        let bridge = Arc::new(
            ExtensionBridge::new(BridgeConfig {
                broadcast_timeout: Duration::from_millis(20),
            })
            .with_direct(direct),
        );
        let kv = Arc::new(MemoryStore::new());
        let results = Arc::new(ResultStore::new(kv.clone(), StoreConfig::default()));
        let lanes = Arc::new(LaneReconciler::new(kv));

        let aggregator = SearchAggregator::new(
            bridge.clone(),
            AdapterConfig {
                simulation_delay: Duration::from_millis(1),
            },
            results,
            lanes,
        );
        (bridge, aggregator)
    }

    #[tokio::test]
    async fn test_dat_simulation_does_not_disturb_live_sylectus() {
        // DAT unscripted (transport absent); Sylectus answers with HTML.
        let direct = ScriptedDirect::new();
        direct.script(
            "SYLECTUS_SEARCH",
            ScriptedReply::Value(json!({
                "success": true,
                "queryId": "syl-9",
                "html": SYLECTUS_TABLE
            })),
        );

        let (_bridge, aggregator) = aggregator(direct);
        let outcome = aggregator.search_all(SearchCriteria::default()).await;

        assert!(outcome.any_success());

        let dat = outcome.dat.data.expect("dat payload");
        assert!(dat.is_simulation());
        assert!(dat.loads.is_empty());

        let sylectus = outcome.sylectus.data.expect("sylectus payload");
        assert!(!sylectus.is_simulation());
        assert_eq!(sylectus.loads.len(), 1);
        assert_eq!(sylectus.loads[0].contact.company, "Acme Logistics");

        // Both results share the one assigned ID.
        assert_eq!(dat.search_module_id, outcome.search_module_id);
        assert_eq!(sylectus.search_module_id, outcome.search_module_id);
    }

    #[tokio::test]
    async fn test_settled_results_are_stored_and_lane_created() {
        let direct = ScriptedDirect::new();
        direct.script(
            "DAT_SEARCH",
            ScriptedReply::Value(json!({
                "success": true,
                "queryId": "q-1",
                "matches": [],
                "matchCounts": { "totalCount": 0 }
            })),
        );
        direct.script(
            "SYLECTUS_SEARCH",
            ScriptedReply::Value(json!({
                "success": true,
                "html": SYLECTUS_TABLE
            })),
        );

        let (_bridge, aggregator) = aggregator(direct);
        let outcome = aggregator.search_all(SearchCriteria::default()).await;

        let stored = aggregator
            .results
            .get_by_search_module_id(&outcome.search_module_id)
            .expect("stored result");
        // DAT-first lookup order.
        assert_eq!(stored.data.expect("payload").provider, Provider::Dat);

        assert_eq!(aggregator.results.results(Provider::Dat).len(), 1);
        assert_eq!(aggregator.results.results(Provider::Sylectus).len(), 1);

        // One lane, shared by both providers' refreshes.
        let lanes = aggregator.lanes.lanes();
        assert_eq!(lanes.len(), 1);
        assert_eq!(lanes[0].id.as_str(), outcome.search_module_id.as_str());
        assert_eq!(lanes[0].dat_query_id.as_deref(), Some("q-1"));
        assert!(lanes[0].driver_ids.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_is_isolated() {
        let direct = ScriptedDirect::new();
        direct.script(
            "DAT_SEARCH",
            ScriptedReply::Value(json!({ "success": false, "error": "expired" })),
        );
        direct.script(
            "SYLECTUS_SEARCH",
            ScriptedReply::Value(json!({ "success": true, "html": "" })),
        );

        let (_bridge, aggregator) = aggregator(direct);
        let outcome = aggregator.search_all(SearchCriteria::default()).await;

        assert!(!outcome.dat.success);
        assert_eq!(outcome.dat.message.as_deref(), Some("expired"));
        assert!(outcome.sylectus.success);

        // The failure is not stored; the success is.
        assert!(aggregator.results.results(Provider::Dat).is_empty());
        assert_eq!(aggregator.results.results(Provider::Sylectus).len(), 1);
        assert_eq!(aggregator.lanes.lanes().len(), 1);
    }

    #[tokio::test]
    async fn test_findings_push_upserts_result_and_refreshes_lane() {
        let direct = ScriptedDirect::new();
        direct.script(
            "DAT_SEARCH",
            ScriptedReply::Value(json!({
                "success": true,
                "queryId": "q-1",
                "matches": [],
                "matchCounts": { "totalCount": 0 }
            })),
        );
        direct.script(
            "SYLECTUS_SEARCH",
            ScriptedReply::Value(json!({ "success": true, "html": "" })),
        );

        let (bridge, aggregator) = aggregator(direct);
        let outcome = aggregator.search_all(SearchCriteria::default()).await;
        aggregator.subscribe_push_results(&bridge);

        // A later findings frame for the same lane streams in unsolicited.
        bridge.deliver_push(PushEvent::new(
            "DAT_SEARCH_FINDINGS",
            json!({
                "laneId": outcome.search_module_id.as_str(),
                "findings": {
                    "queryId": "q-1",
                    "matches": [
                        { "id": "m-9", "origin": { "city": "Chicago", "state": "IL" } }
                    ],
                    "matchCounts": { "totalCount": 3 },
                    "timestamp": "2025-08-05T10:00:00Z"
                }
            }),
        ));

        // The stored DAT result was replaced in place, not appended.
        let dat_results = aggregator.results.results(Provider::Dat);
        assert_eq!(dat_results.len(), 1);
        let data = dat_results[0].data.as_ref().expect("payload");
        assert_eq!(data.loads.len(), 1);
        assert_eq!(data.loads[0].id.as_str(), "m-9");
        assert_eq!(data.timestamp, "2025-08-05T10:00:00Z");

        let lanes = aggregator.lanes.lanes();
        assert_eq!(lanes.len(), 1);
        assert_eq!(lanes[0].results_count, Some(3));
        assert_eq!(
            lanes[0].last_refreshed.as_deref(),
            Some("2025-08-05T10:00:00Z")
        );
    }

    #[tokio::test]
    async fn test_load_batch_push_refreshes_lane_by_query_id() {
        let direct = ScriptedDirect::new();
        direct.script(
            "DAT_SEARCH",
            ScriptedReply::Value(json!({
                "success": true,
                "queryId": "q-7",
                "matches": [],
                "matchCounts": { "totalCount": 0 }
            })),
        );
        direct.script(
            "SYLECTUS_SEARCH",
            ScriptedReply::Value(json!({ "success": true, "html": "" })),
        );

        let (bridge, aggregator) = aggregator(direct);
        aggregator.search_all(SearchCriteria::default()).await;
        aggregator.subscribe_push_results(&bridge);

        bridge.deliver_push(PushEvent::new(
            "DAT_LOADS_RECEIVED",
            json!({
                "queryId": "q-7",
                "loads": [{}, {}],
                "matchCount": 2,
                "timestamp": "2025-08-05T11:00:00Z"
            }),
        ));
        assert_eq!(aggregator.lanes.lanes()[0].results_count, Some(2));

        // An unknown query ID refreshes nothing and creates nothing.
        bridge.deliver_push(PushEvent::new(
            "DAT_LOADS_RECEIVED",
            json!({ "queryId": "q-other", "loads": [], "matchCount": 9 }),
        ));
        let lanes = aggregator.lanes.lanes();
        assert_eq!(lanes.len(), 1);
        assert_eq!(lanes[0].results_count, Some(2));
    }
}
