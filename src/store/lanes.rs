//! Lane reconciler.
//!
//! A [`Lane`] is the durable, user-visible aggregate of a search: created
//! on the first successful result for a new search (or manually by a
//! user), refreshed on every subsequent result bearing a matching
//! identifier, and never auto-deleted. Reconciliation matches by, in
//! order: lane ID, originating search module ID, then either provider
//! query ID (legacy lanes predating search module IDs).
//!
//! A merge overwrites geography, dates, weight, results count, refresh
//! timestamp, and the per-provider query ID - and unconditionally
//! preserves `id` and `driver_ids`. Driver assignment changes only
//! through [`LaneReconciler::assign_drivers`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::identifiers::LaneId;
use crate::model::{Lane, Provider, ResultPayload, SearchResult, now_rfc3339};
use crate::provider::dat_results_count;
use crate::store::kv::KeyValueStore;

// ============================================================================
// Constants
// ============================================================================

/// Storage key for the lane list.
pub const LANES_KEY: &str = "lanes";

// ============================================================================
// LaneReconciler
// ============================================================================

/// Persisted lane list with result-driven reconciliation.
pub struct LaneReconciler {
    /// Persistence backend.
    kv: Arc<dyn KeyValueStore>,
    /// In-memory lane list.
    lanes: Mutex<Vec<Lane>>,
}

impl LaneReconciler {
    /// Opens the reconciler, rehydrating the lane list.
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let lanes = rehydrate(kv.as_ref());
        Self {
            kv,
            lanes: Mutex::new(lanes),
        }
    }

    /// Returns a copy of every lane.
    #[must_use]
    pub fn lanes(&self) -> Vec<Lane> {
        self.lanes.lock().clone()
    }

    /// Creates or refreshes the lane for a successful search result.
    ///
    /// Failure results and results with an empty search module ID are
    /// ignored. Returns the lane as stored after the upsert.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated lane list cannot be persisted.
    pub fn upsert_from_result(&self, result: &SearchResult) -> Result<Option<Lane>> {
        let Some(data) = &result.data else {
            return Ok(None);
        };
        if data.search_module_id.is_empty() {
            warn!("ignoring result with empty search module id");
            return Ok(None);
        }

        let mut lanes = self.lanes.lock();
        let lane = match position_of(&lanes, data) {
            Some(index) => {
                merge(&mut lanes[index], data);
                debug!(
                    lane_id = %lanes[index].id,
                    search_module_id = %data.search_module_id,
                    "refreshed lane"
                );
                lanes[index].clone()
            }
            None => {
                let lane = lane_from_payload(data);
                debug!(
                    lane_id = %lane.id,
                    provider = %data.provider,
                    "created lane"
                );
                lanes.push(lane.clone());
                lane
            }
        };

        persist(self.kv.as_ref(), &lanes)?;
        Ok(Some(lane))
    }

    /// Applies a push-delivered refresh to an existing lane.
    ///
    /// `key` is matched with the same cascade as a result upsert (lane
    /// ID, originating search module ID, either provider query ID). Only
    /// the results count and refresh timestamp change; geography, query
    /// IDs, and driver assignments are untouched. A push for an unknown
    /// key is dropped - pushes never create lanes. Returns `true` if a
    /// lane was refreshed.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated lane list cannot be persisted.
    pub fn record_push_refresh(
        &self,
        key: &str,
        results_count: u64,
        timestamp: Option<String>,
    ) -> Result<bool> {
        let mut lanes = self.lanes.lock();
        let Some(index) = position_by_key(&lanes, key) else {
            debug!(key, "push refresh for unknown lane, dropping");
            return Ok(false);
        };

        lanes[index].results_count = Some(results_count);
        lanes[index].last_refreshed = Some(timestamp.unwrap_or_else(now_rfc3339));
        persist(self.kv.as_ref(), &lanes)?;
        Ok(true)
    }

    /// Inserts or replaces a manually created lane, matched by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated lane list cannot be persisted.
    pub fn insert(&self, lane: Lane) -> Result<()> {
        let mut lanes = self.lanes.lock();
        match lanes.iter().position(|l| l.id == lane.id) {
            Some(index) => lanes[index] = lane,
            None => lanes.push(lane),
        }
        persist(self.kv.as_ref(), &lanes)
    }

    /// Replaces a lane's driver assignment.
    ///
    /// This is the only operation that changes `driver_ids`. Returns
    /// `true` if the lane exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated lane list cannot be persisted.
    pub fn assign_drivers(&self, lane_id: &LaneId, driver_ids: Vec<String>) -> Result<bool> {
        let mut lanes = self.lanes.lock();
        let Some(lane) = lanes.iter_mut().find(|l| &l.id == lane_id) else {
            return Ok(false);
        };

        lane.driver_ids = driver_ids;
        persist(self.kv.as_ref(), &lanes)?;
        Ok(true)
    }

    /// Deletes a lane. Lanes are only ever deleted through this call.
    ///
    /// Returns `true` if a lane was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated lane list cannot be persisted.
    pub fn delete(&self, lane_id: &LaneId) -> Result<bool> {
        let mut lanes = self.lanes.lock();
        let Some(index) = lanes.iter().position(|l| &l.id == lane_id) else {
            return Ok(false);
        };

        lanes.remove(index);
        persist(self.kv.as_ref(), &lanes)?;
        Ok(true)
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Finds the lane a result belongs to.
fn position_of(lanes: &[Lane], data: &ResultPayload) -> Option<usize> {
    position_by_key(lanes, data.search_module_id.as_str())
}

/// Finds a lane by identifier cascade.
///
/// Match order: lane ID, then the lane's originating search module ID,
/// then either provider query ID (legacy lanes predating search module
/// IDs).
fn position_by_key(lanes: &[Lane], key: &str) -> Option<usize> {
    lanes
        .iter()
        .position(|lane| lane.id.as_str() == key)
        .or_else(|| {
            lanes.iter().position(|lane| {
                lane.search_module_id
                    .as_ref()
                    .is_some_and(|id| id.as_str() == key)
            })
        })
        .or_else(|| {
            lanes.iter().position(|lane| {
                lane.dat_query_id.as_deref() == Some(key)
                    || lane.sylectus_query_id.as_deref() == Some(key)
            })
        })
}

/// Refreshes an existing lane from a result payload.
///
/// `id` and `driver_ids` are never touched here.
fn merge(lane: &mut Lane, data: &ResultPayload) {
    lane.origin = place_display(&data.criteria, "origin");
    lane.destination = place_display(&data.criteria, "destination");
    lane.date_range = date_range(&data.criteria);
    lane.weight = weight_display(&data.criteria);
    lane.results_count = Some(results_count(data));
    lane.last_refreshed = Some(data.timestamp.clone());
    lane.search_module_id = Some(data.search_module_id.clone());

    match data.provider {
        Provider::Dat => lane.dat_query_id = data.query_id.clone(),
        Provider::Sylectus => lane.sylectus_query_id = data.query_id.clone(),
    }
}

/// Creates a fresh lane for a search with no existing lane.
fn lane_from_payload(data: &ResultPayload) -> Lane {
    let mut lane = Lane {
        id: LaneId::from(&data.search_module_id),
        origin: String::new(),
        destination: String::new(),
        date_range: [None, None],
        weight: String::new(),
        driver_ids: Vec::new(),
        source: Some(data.provider),
        dat_query_id: None,
        sylectus_query_id: None,
        results_count: None,
        last_refreshed: None,
        search_module_id: Some(data.search_module_id.clone()),
    };
    merge(&mut lane, data);
    lane
}

/// Result count for a lane refresh.
///
/// DAT's count follows the documented raw-payload precedence (see
/// [`dat_results_count`]), zero included; Sylectus counts its extracted
/// loads.
fn results_count(data: &ResultPayload) -> u64 {
    match data.provider {
        Provider::Dat => dat_results_count(&data.raw),
        Provider::Sylectus => data.loads.len() as u64,
    }
}

// ============================================================================
// Criteria Display
// ============================================================================

/// Display string for a criteria place field.
///
/// Tolerates both a pre-formatted `"City, ST"` string and a
/// `{city, state}` object.
fn place_display(criteria: &Value, key: &str) -> String {
    match criteria.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(place)) => {
            let city = place.get("city").and_then(|v| v.as_str()).unwrap_or_default();
            let state = place
                .get("state")
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            match (city.is_empty(), state.is_empty()) {
                (false, false) => format!("{city}, {state}"),
                (false, true) => city.to_string(),
                (true, false) => state.to_string(),
                (true, true) => String::new(),
            }
        }
        _ => String::new(),
    }
}

/// `[start, end]` ISO dates from the criteria, each nullable.
fn date_range(criteria: &Value) -> [Option<String>; 2] {
    let at = |key: &str| {
        criteria
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };
    [at("dateStart"), at("dateEnd")]
}

/// Weight filter display string, tolerating string or numeric values.
fn weight_display(criteria: &Value) -> String {
    match criteria.get("weight") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Parses the stored lane list, tolerating absence and corruption.
fn rehydrate(kv: &dyn KeyValueStore) -> Vec<Lane> {
    let stored = match kv.get(LANES_KEY) {
        Ok(stored) => stored,
        Err(error) => {
            warn!(%error, "failed to read stored lanes, starting empty");
            return Vec::new();
        }
    };

    match stored {
        Some(json) => match serde_json::from_str(&json) {
            Ok(lanes) => lanes,
            Err(error) => {
                warn!(%error, "stored lanes corrupt, starting empty");
                Vec::new()
            }
        },
        None => Vec::new(),
    }
}

/// Persists the full lane list.
fn persist(kv: &dyn KeyValueStore, lanes: &[Lane]) -> Result<()> {
    let json = serde_json::to_string(lanes)?;
    kv.set(LANES_KEY, &json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::identifiers::SearchModuleId;
    use crate::model::now_rfc3339;
    use crate::store::kv::MemoryStore;

    fn payload(provider: Provider, smid: &str, criteria: Value, raw: Value) -> ResultPayload {
        ResultPayload {
            search_module_id: SearchModuleId::from_string(smid),
            timestamp: now_rfc3339(),
            provider,
            mode: None,
            query_id: Some(format!("{}-query", provider.as_str().to_lowercase())),
            criteria,
            raw,
            loads: Vec::new(),
        }
    }

    fn reconciler() -> (Arc<MemoryStore>, LaneReconciler) {
        let kv = Arc::new(MemoryStore::new());
        let reconciler = LaneReconciler::new(kv.clone());
        (kv, reconciler)
    }

    #[test]
    fn test_first_result_creates_lane() {
        let (_, reconciler) = reconciler();
        let criteria = json!({
            "origin": { "city": "Chicago", "state": "IL" },
            "destination": "Dallas, TX",
            "dateStart": "2025-08-04",
            "dateEnd": null,
            "weight": 2400
        });
        let raw = json!({ "matchCounts": { "totalCount": 12 } });

        let lane = reconciler
            .upsert_from_result(&SearchResult::success(payload(
                Provider::Dat,
                "SM_1_a",
                criteria,
                raw,
            )))
            .expect("upsert")
            .expect("lane");

        assert_eq!(lane.id.as_str(), "SM_1_a");
        assert_eq!(lane.origin, "Chicago, IL");
        assert_eq!(lane.destination, "Dallas, TX");
        assert_eq!(lane.date_range, [Some("2025-08-04".to_string()), None]);
        assert_eq!(lane.weight, "2400");
        assert_eq!(lane.results_count, Some(12));
        assert_eq!(lane.source, Some(Provider::Dat));
        assert_eq!(lane.dat_query_id.as_deref(), Some("dat-query"));
        assert!(lane.driver_ids.is_empty());
        assert!(lane.last_refreshed.is_some());
    }

    #[test]
    fn test_refresh_preserves_id_and_drivers() {
        let (_, reconciler) = reconciler();
        let smid = "SM_1_a";

        reconciler
            .upsert_from_result(&SearchResult::success(payload(
                Provider::Dat,
                smid,
                json!({ "origin": "Chicago, IL" }),
                json!({}),
            )))
            .expect("upsert");
        assert!(
            reconciler
                .assign_drivers(&LaneId::from_string(smid), vec!["d-1".to_string()])
                .expect("assign")
        );

        // A refresh from the sibling provider merges into the same lane.
        let lane = reconciler
            .upsert_from_result(&SearchResult::success(payload(
                Provider::Sylectus,
                smid,
                json!({ "origin": "Joliet, IL" }),
                json!({}),
            )))
            .expect("upsert")
            .expect("lane");

        assert_eq!(reconciler.lanes().len(), 1);
        assert_eq!(lane.id.as_str(), smid);
        assert_eq!(lane.origin, "Joliet, IL");
        assert_eq!(lane.driver_ids, ["d-1"]);
        assert_eq!(lane.dat_query_id.as_deref(), Some("dat-query"));
        assert_eq!(lane.sylectus_query_id.as_deref(), Some("sylectus-query"));
    }

    #[test]
    fn test_matches_legacy_lane_by_query_id() {
        let (_, reconciler) = reconciler();

        // Legacy lane: no search module id, only a provider query id.
        let mut legacy = Lane::manual(LaneId::from_string("legacy-1"), "A", "B");
        legacy.dat_query_id = Some("SM_9_z".to_string());
        reconciler.insert(legacy).expect("insert");

        let lane = reconciler
            .upsert_from_result(&SearchResult::success(payload(
                Provider::Dat,
                "SM_9_z",
                json!({}),
                json!({}),
            )))
            .expect("upsert")
            .expect("lane");

        assert_eq!(reconciler.lanes().len(), 1);
        assert_eq!(lane.id.as_str(), "legacy-1");
        assert_eq!(
            lane.search_module_id.as_ref().map(|id| id.as_str()),
            Some("SM_9_z")
        );
    }

    #[test]
    fn test_failure_results_ignored() {
        let (_, reconciler) = reconciler();
        let lane = reconciler
            .upsert_from_result(&SearchResult::failure("down"))
            .expect("upsert");

        assert!(lane.is_none());
        assert!(reconciler.lanes().is_empty());
    }

    #[test]
    fn test_push_refresh_updates_count_only() {
        let (_, reconciler) = reconciler();
        reconciler
            .upsert_from_result(&SearchResult::success(payload(
                Provider::Dat,
                "SM_1_a",
                json!({ "origin": "Chicago, IL" }),
                json!({ "resultsFound": 1 }),
            )))
            .expect("upsert");
        assert!(
            reconciler
                .assign_drivers(&LaneId::from_string("SM_1_a"), vec!["d-1".to_string()])
                .expect("assign")
        );

        assert!(
            reconciler
                .record_push_refresh("SM_1_a", 7, Some("2025-08-05T10:00:00Z".to_string()))
                .expect("refresh")
        );

        let lanes = reconciler.lanes();
        let lane = &lanes[0];
        assert_eq!(lane.results_count, Some(7));
        assert_eq!(lane.last_refreshed.as_deref(), Some("2025-08-05T10:00:00Z"));
        assert_eq!(lane.origin, "Chicago, IL");
        assert_eq!(lane.driver_ids, ["d-1"]);

        // An unknown key is dropped and never creates a lane.
        assert!(!reconciler.record_push_refresh("SM_9_z", 3, None).expect("refresh"));
        assert_eq!(reconciler.lanes().len(), 1);
    }

    #[test]
    fn test_dat_count_follows_documented_precedence() {
        let (_, reconciler) = reconciler();

        let lane = reconciler
            .upsert_from_result(&SearchResult::success(payload(
                Provider::Dat,
                "SM_1_a",
                json!({}),
                json!({ "resultsFound": 5 }),
            )))
            .expect("upsert")
            .expect("lane");
        assert_eq!(lane.results_count, Some(5));

        // A raw shape carrying none of the count fields records zero even
        // when normalized loads are present.
        let mut with_loads = payload(Provider::Dat, "SM_2_b", json!({}), json!({}));
        with_loads.loads = vec![
            serde_json::from_value(json!({
                "id": "m-1",
                "source": "DAT",
                "searchModuleId": "SM_2_b"
            }))
            .expect("load"),
        ];
        let lane = reconciler
            .upsert_from_result(&SearchResult::success(with_loads))
            .expect("upsert")
            .expect("lane");
        assert_eq!(lane.results_count, Some(0));
    }

    #[test]
    fn test_delete_is_explicit_only() {
        let (_, reconciler) = reconciler();
        reconciler
            .upsert_from_result(&SearchResult::success(payload(
                Provider::Dat,
                "SM_1_a",
                json!({}),
                json!({}),
            )))
            .expect("upsert");

        assert!(reconciler.delete(&LaneId::from_string("SM_1_a")).expect("delete"));
        assert!(reconciler.lanes().is_empty());
        assert!(!reconciler.delete(&LaneId::from_string("SM_1_a")).expect("again"));
    }

    #[test]
    fn test_rehydrates_from_persisted_state() {
        let (kv, reconciler) = reconciler();
        reconciler
            .upsert_from_result(&SearchResult::success(payload(
                Provider::Dat,
                "SM_1_a",
                json!({}),
                json!({}),
            )))
            .expect("upsert");
        drop(reconciler);

        let reopened = LaneReconciler::new(kv);
        assert_eq!(reopened.lanes().len(), 1);
        assert_eq!(reopened.lanes()[0].id.as_str(), "SM_1_a");
    }

    #[test]
    fn test_corrupt_persisted_state_starts_empty() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(LANES_KEY, "{{{").expect("seed");

        let reconciler = LaneReconciler::new(kv);
        assert!(reconciler.lanes().is_empty());
    }
}
