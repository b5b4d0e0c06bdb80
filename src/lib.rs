//! Load-board aggregation core.
//!
//! This library drives multi-provider freight searches through a browser
//! extension relay: it correlates request/response pairs over the
//! page/extension boundary, monitors the relay's health, normalizes each
//! provider's payload into one shared model, and reconciles results into
//! durable, user-visible Lanes.
//!
//! # Architecture
//!
//! ```text
//!   SearchAggregator
//!     ├── DatAdapter ──────┐
//!     ├── SylectusAdapter ─┤
//!     │    └── extract_loads (HTML results table)
//!     │                    ▼
//!     │             ExtensionBridge ── direct channel / broadcast fallback
//!     ├── ResultStore ──┐
//!     └── LaneReconciler┴── KeyValueStore (file or memory)
//! ```
//!
//! Key design principles:
//!
//! - One [`SearchModuleId`] per logical search, threaded unchanged through
//!   every provider request, result, and the Lane derived from it
//! - Providers are isolated: a dead transport degrades to a tagged
//!   simulated result instead of failing the sibling provider
//! - Provider payload shapes stay inside their adapter; shared code only
//!   ever sees the normalized model
//! - No global registries: every component takes its collaborators
//!   explicitly
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use loadboard_bridge::{
//!     AdapterConfig, ExtensionBridge, BridgeConfig, FileStore, LaneReconciler,
//!     ResultStore, Result, SearchAggregator, SearchCriteria, StoreConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let bridge = Arc::new(ExtensionBridge::new(BridgeConfig::default()));
//!     let kv = Arc::new(FileStore::new("./data")?);
//!     let results = Arc::new(ResultStore::new(kv.clone(), StoreConfig::default()));
//!     let lanes = Arc::new(LaneReconciler::new(kv));
//!
//!     let aggregator =
//!         SearchAggregator::new(bridge, AdapterConfig::default(), results, lanes.clone());
//!     let outcome = aggregator.search_all(SearchCriteria::default()).await;
//!
//!     println!("search {} settled", outcome.search_module_id);
//!     for lane in lanes.lanes() {
//!         println!("lane {}: {:?} results", lane.id, lane.results_count);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`aggregator`] | Multi-provider search orchestration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`model`] | Provider-agnostic data model |
//! | [`monitor`] | Extension connection monitor |
//! | [`protocol`] | Extension message envelope types |
//! | [`provider`] | DAT and Sylectus adapters, HTML Load Extractor |
//! | [`store`] | Persistence: results, lanes, key/value contract |
//! | [`transport`] | Correlation transport over two channel strategies |

// ============================================================================
// Modules
// ============================================================================

/// Multi-provider search orchestration.
pub mod aggregator;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for search correlation.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Provider-agnostic data model.
pub mod model;

/// Extension connection monitor.
pub mod monitor;

/// Extension message envelope types.
///
/// Internal wire shapes: outbound requests, broadcast frames, push events.
pub mod protocol;

/// Provider adapters and the HTML Load Extractor.
pub mod provider;

/// Persistence: key/value contract, result store, lane reconciler.
pub mod store;

/// Correlation transport over the page/extension boundary.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Orchestration
pub use aggregator::{AggregateOutcome, SearchAggregator};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{LaneId, LoadId, RequestId, SearchModuleId};

// Model types
pub use model::{
    Contact, Lane, Load, LoadExtras, Location, Provider, ResultPayload, SearchCriteria,
    SearchRequest, SearchResult,
};

// Monitor types
pub use monitor::{ConnectionMonitor, ConnectionState, MonitorConfig};

// Protocol types
pub use protocol::{OutboundMessage, ParsedEvent, PushEvent};

// Provider types
pub use provider::{AdapterConfig, DatAdapter, SylectusAdapter, extract_loads};

// Store types
pub use store::{FileStore, KeyValueStore, LaneReconciler, MemoryStore, ResultStore, StoreConfig};

// Transport types
pub use transport::{BridgeConfig, BroadcastChannel, DirectChannel, ExtensionBridge};
