//! Provider adapters.
//!
//! Each adapter translates between the provider-agnostic
//! [`SearchRequest`](crate::model::SearchRequest)/[`SearchResult`](crate::model::SearchResult)
//! model and one external load board's wire format. Provider-specific
//! payload shapes stay fully contained here; shared code only ever sees
//! the normalized model.
//!
//! # Contract
//!
//! Adapters never throw past their boundary:
//!
//! - Transport failures fall back to a **simulated** result after a fixed
//!   synthetic delay - `success: true`, `mode: "simulation"`, zero loads,
//!   a `mock_<epochMillis>` query ID - so the dashboard remains
//!   exercisable without a live extension. The `mode` tag lets downstream
//!   code and tests distinguish real from simulated data.
//! - Every other failure folds into `SearchResult { success: false }`.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dat` | DAT adapter (extension relay passthrough) |
//! | `sylectus` | Sylectus adapter and HTML Load Extractor |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::model::{Provider, ResultPayload, SearchRequest, now_rfc3339};

// ============================================================================
// Submodules
// ============================================================================

/// DAT adapter.
pub mod dat;

/// Sylectus adapter and HTML Load Extractor.
pub mod sylectus;

// ============================================================================
// Re-exports
// ============================================================================

pub use dat::{DatAdapter, dat_results_count};
pub use sylectus::SylectusAdapter;
pub use sylectus::extract::extract_loads;

// ============================================================================
// Constants
// ============================================================================

/// Default synthetic delay before a simulated fallback result (1.5s).
const DEFAULT_SIMULATION_DELAY: Duration = Duration::from_millis(1500);

// ============================================================================
// AdapterConfig
// ============================================================================

/// Adapter timing configuration.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Synthetic delay before returning a simulated fallback result.
    pub simulation_delay: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            simulation_delay: DEFAULT_SIMULATION_DELAY,
        }
    }
}

// ============================================================================
// Simulation Fallback
// ============================================================================

/// Builds the simulated payload returned when transport is down.
pub(crate) fn simulated_payload(provider: Provider, request: &SearchRequest) -> ResultPayload {
    ResultPayload {
        search_module_id: request.search_module_id.clone(),
        timestamp: now_rfc3339(),
        provider,
        mode: Some("simulation".to_string()),
        query_id: Some(format!("mock_{}", Utc::now().timestamp_millis())),
        criteria: serde_json::to_value(&request.criteria).unwrap_or(Value::Null),
        raw: Value::Null,
        loads: Vec::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::SearchCriteria;

    #[test]
    fn test_simulated_payload_is_tagged() {
        let request = SearchRequest::new(SearchCriteria::default());
        let payload = simulated_payload(Provider::Dat, &request);

        assert!(payload.is_simulation());
        assert!(payload.loads.is_empty());
        assert_eq!(payload.search_module_id, request.search_module_id);
        assert!(
            payload
                .query_id
                .as_deref()
                .is_some_and(|id| id.starts_with("mock_"))
        );
    }
}
