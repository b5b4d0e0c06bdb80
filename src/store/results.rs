//! Per-provider search result store.
//!
//! Keeps one ordered list of [`SearchResult`]s per provider, upserted by
//! `searchModuleId`: a result for a search that is already present
//! replaces the old entry in place, preserving its list position; a new
//! search appends. The full per-provider list is persisted to the
//! [`KeyValueStore`] on every mutation and rehydrated on construction,
//! tolerating absent or corrupt stored JSON.
//!
//! Results older than the staleness bound (default 24 h) are removed by
//! [`ResultStore::cleanup`], which runs once at construction and is safe
//! to call again at any time.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::Result;
use crate::identifiers::SearchModuleId;
use crate::model::{Provider, SearchResult};
use crate::store::kv::KeyValueStore;

// ============================================================================
// Constants
// ============================================================================

/// Storage key for the DAT result list.
pub const DAT_RESULTS_KEY: &str = "dat_search_results";

/// Storage key for the Sylectus result list.
pub const SYLECTUS_RESULTS_KEY: &str = "sylectus_search_results";

/// Default staleness bound (24 h).
const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Maps a provider to its storage key.
#[inline]
fn storage_key(provider: Provider) -> &'static str {
    match provider {
        Provider::Dat => DAT_RESULTS_KEY,
        Provider::Sylectus => SYLECTUS_RESULTS_KEY,
    }
}

// ============================================================================
// StoreConfig
// ============================================================================

/// Result store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Results whose capture timestamp is strictly older than this bound
    /// are removed by cleanup.
    pub stale_after: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

// ============================================================================
// ResultStore
// ============================================================================

/// Ordered, persisted, per-provider search result lists.
pub struct ResultStore {
    /// Persistence backend.
    kv: Arc<dyn KeyValueStore>,
    /// Staleness configuration.
    config: StoreConfig,
    /// In-memory lists, one per provider.
    results: Mutex<FxHashMap<Provider, Vec<SearchResult>>>,
}

impl ResultStore {
    /// Opens the store, rehydrating both provider lists and removing
    /// stale entries.
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>, config: StoreConfig) -> Self {
        let mut results = FxHashMap::default();
        for provider in [Provider::Dat, Provider::Sylectus] {
            results.insert(provider, rehydrate(kv.as_ref(), storage_key(provider)));
        }

        let store = Self {
            kv,
            config,
            results: Mutex::new(results),
        };
        if let Err(error) = store.cleanup(Utc::now()) {
            warn!(%error, "initial result cleanup failed to persist");
        }
        store
    }

    /// Records a search result, upserting by its search module ID.
    ///
    /// A result carrying no payload (a failure) is not stored. An
    /// existing entry for the same search is replaced in place; a new
    /// search appends.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated list cannot be persisted; the
    /// in-memory list is already updated when that happens.
    pub fn record(&self, result: &SearchResult) -> Result<()> {
        let Some(data) = &result.data else {
            debug!("skipping store of payload-less result");
            return Ok(());
        };
        if data.search_module_id.is_empty() {
            warn!("skipping store of result with empty search module id");
            return Ok(());
        }

        let provider = data.provider;
        let mut map = self.results.lock();
        let list = map.entry(provider).or_default();

        match position_of(list, &data.search_module_id) {
            Some(index) => list[index] = result.clone(),
            None => list.push(result.clone()),
        }

        debug!(
            provider = %provider,
            search_module_id = %data.search_module_id,
            total = list.len(),
            "recorded search result"
        );
        persist(self.kv.as_ref(), storage_key(provider), list)
    }

    /// Returns a copy of one provider's result list, oldest first.
    #[must_use]
    pub fn results(&self, provider: Provider) -> Vec<SearchResult> {
        self.results
            .lock()
            .get(&provider)
            .cloned()
            .unwrap_or_default()
    }

    /// Looks up a result by search module ID across providers, DAT first.
    #[must_use]
    pub fn get_by_search_module_id(&self, id: &SearchModuleId) -> Option<SearchResult> {
        let map = self.results.lock();
        for provider in [Provider::Dat, Provider::Sylectus] {
            if let Some(list) = map.get(&provider) {
                if let Some(index) = position_of(list, id) {
                    return Some(list[index].clone());
                }
            }
        }
        None
    }

    /// Deletes one provider's result for a search.
    ///
    /// Returns `true` if an entry was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated list cannot be persisted.
    pub fn delete(&self, provider: Provider, id: &SearchModuleId) -> Result<bool> {
        let mut map = self.results.lock();
        let Some(list) = map.get_mut(&provider) else {
            return Ok(false);
        };
        let Some(index) = position_of(list, id) else {
            return Ok(false);
        };

        list.remove(index);
        persist(self.kv.as_ref(), storage_key(provider), list)?;
        Ok(true)
    }

    /// Deletes a search's results from every provider list.
    ///
    /// Returns `true` if any entry was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if an updated list cannot be persisted.
    pub fn delete_everywhere(&self, id: &SearchModuleId) -> Result<bool> {
        let mut removed = false;
        for provider in [Provider::Dat, Provider::Sylectus] {
            removed |= self.delete(provider, id)?;
        }
        Ok(removed)
    }

    /// Removes results captured strictly before `now - stale_after`.
    ///
    /// Entries with an unparseable timestamp are kept. Idempotent:
    /// calling twice with the same `now` removes nothing the second time.
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error if an updated list cannot be persisted.
    pub fn cleanup(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now
            - chrono::Duration::from_std(self.config.stale_after)
                .unwrap_or_else(|_| chrono::Duration::hours(24));
        let mut removed = 0;

        let mut map = self.results.lock();
        for provider in [Provider::Dat, Provider::Sylectus] {
            let Some(list) = map.get_mut(&provider) else {
                continue;
            };

            let before = list.len();
            list.retain(|result| !is_stale(result, cutoff));
            let dropped = before - list.len();

            if dropped > 0 {
                debug!(provider = %provider, dropped, "removed stale results");
                persist(self.kv.as_ref(), storage_key(provider), list)?;
                removed += dropped;
            }
        }

        Ok(removed)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Index of the entry for `id` in a result list.
fn position_of(list: &[SearchResult], id: &SearchModuleId) -> Option<usize> {
    list.iter()
        .position(|result| result.search_module_id() == Some(id))
}

/// Returns `true` if the result was captured strictly before `cutoff`.
///
/// Results with a missing or unparseable timestamp are never stale.
fn is_stale(result: &SearchResult, cutoff: DateTime<Utc>) -> bool {
    result
        .timestamp()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .is_some_and(|ts| ts.with_timezone(&Utc) < cutoff)
}

/// Parses a stored list, tolerating absence and corruption.
fn rehydrate(kv: &dyn KeyValueStore, key: &str) -> Vec<SearchResult> {
    let stored = match kv.get(key) {
        Ok(stored) => stored,
        Err(error) => {
            warn!(key, %error, "failed to read stored results, starting empty");
            return Vec::new();
        }
    };

    match stored {
        Some(json) => match serde_json::from_str(&json) {
            Ok(list) => list,
            Err(error) => {
                warn!(key, %error, "stored results corrupt, starting empty");
                Vec::new()
            }
        },
        None => Vec::new(),
    }
}

/// Persists a full list under its key.
fn persist(kv: &dyn KeyValueStore, key: &str, list: &[SearchResult]) -> Result<()> {
    let json = serde_json::to_string(list)?;
    kv.set(key, &json)
}

// ============================================================================
// Tests
// ============================================================================
