//! Type-safe identifiers for search correlation.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time:
//!
//! - [`RequestId`] - correlates one transport request with its response
//! - [`SearchModuleId`] - correlates one user-initiated search across
//!   every provider result and the Lane derived from it
//! - [`LaneId`] - identifies a persisted Lane
//! - [`LoadId`] - identifies one normalized load posting
//!
//! `SearchModuleId` and `LoadId` carry generated string forms
//! (`SM_<millis>_<base36>`, `load_<millis>_<base36>`) but are opaque to
//! every consumer except as stable join keys.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Helpers
// ============================================================================

/// Base36 alphabet used for generated ID suffixes.
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Encodes the low bits of a random value as `len` base36 characters.
fn base36_suffix(len: usize) -> String {
    let mut bits = Uuid::new_v4().as_u128();
    let mut out = String::with_capacity(len);

    for _ in 0..len {
        out.push(BASE36[(bits % 36) as usize] as char);
        bits /= 36;
    }

    out
}

/// Current wall-clock time in unix milliseconds.
fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// ============================================================================
// RequestId
// ============================================================================

/// Unique identifier for transport request/response correlation.
///
/// Wraps a UUID v4. Each outgoing request owns exactly one `RequestId`;
/// a broadcast event resolves a pending request only when its `requestId`
/// field matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh request ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SearchModuleId
// ============================================================================

/// Opaque identifier correlating one user-initiated multi-provider search.
///
/// Generated form is `SM_<unix-millis>_<6-char base36>`. Assigned once per
/// logical search and threaded unchanged through every provider request,
/// result, and the Lane derived from it. Consumers treat it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchModuleId(String);

impl SearchModuleId {
    /// Generates a fresh search module ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("SM_{}_{}", epoch_millis(), base36_suffix(6)))
    }

    /// Wraps an existing ID string (e.g. one read back from storage).
    #[inline]
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the ID is empty.
    ///
    /// A success result carrying an empty ID is an error condition at the
    /// store boundary (logged, not fatal).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SearchModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SearchModuleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ============================================================================
// LaneId
// ============================================================================

/// Identifier of a persisted Lane.
///
/// Stable across refreshes of the same logical search: derived lanes use
/// the originating [`SearchModuleId`] verbatim; legacy manual lanes carry
/// a user-assigned ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaneId(String);

impl LaneId {
    /// Wraps an existing lane ID string.
    #[inline]
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&SearchModuleId> for LaneId {
    fn from(id: &SearchModuleId) -> Self {
        Self(id.as_str().to_string())
    }
}

// ============================================================================
// LoadId
// ============================================================================

/// Identifier of one normalized load posting.
///
/// Usually derived from a provider order number; synthesized as
/// `load_<unix-millis>_<base36>` when the provider markup carries none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(String);

impl LoadId {
    /// Wraps a provider-supplied load ID.
    #[inline]
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthesizes an ID for a row with no extractable order number.
    #[must_use]
    pub fn synthesize() -> Self {
        Self(format!("load_{}_{}", epoch_millis(), base36_suffix(6)))
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the ID is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
