//! Persistence: key/value contract, result store, lane reconciler.
//!
//! The storage contract is a minimal string key/value seam
//! ([`KeyValueStore`]); the stores above it persist whole collections as
//! JSON under well-known keys and keep an in-memory working copy that is
//! the source of truth between mutations.
//!
//! | Key | Collection |
//! |-----|------------|
//! | `dat_search_results` | DAT [`SearchResult`](crate::model::SearchResult) list |
//! | `sylectus_search_results` | Sylectus [`SearchResult`](crate::model::SearchResult) list |
//! | `lanes` | [`Lane`](crate::model::Lane) list |
//!
//! Absent or corrupt stored values are tolerated everywhere: stores
//! rehydrate to an empty collection and log a warning, never fail.

// ============================================================================
// Submodules
// ============================================================================

/// Key/value persistence contract and backends.
pub mod kv;

/// Lane reconciler.
pub mod lanes;

/// Per-provider search result store.
pub mod results;

// ============================================================================
// Re-exports
// ============================================================================

pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use lanes::{LANES_KEY, LaneReconciler};
pub use results::{DAT_RESULTS_KEY, ResultStore, StoreConfig, SYLECTUS_RESULTS_KEY};
