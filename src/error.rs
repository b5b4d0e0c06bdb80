//! Error types for the load-board bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use loadboard_bridge::{Result, Error};
//!
//! async fn example(bridge: &ExtensionBridge) -> Result<()> {
//!     let response = bridge.send(OutboundMessage::connection_check()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Transport | [`Error::ChannelUnavailable`], [`Error::RequestRejected`], [`Error::TransportTimeout`] |
//! | Provider | [`Error::ProviderRejected`] |
//! | Extraction | [`Error::ExtractionRow`] |
//! | Persistence | [`Error::Persistence`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::ChannelClosed`] |
//!
//! Propagation policy: provider adapters catch every transport error at
//! their boundary and fold it into a `SearchResult { success: false }`,
//! so the stores only ever branch on `success`. Persistence read errors
//! are tolerated at the store boundary (empty collection, logged).

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// No viable channel to the extension exists at all.
    ///
    /// Terminal for the call: neither the direct extension channel nor the
    /// broadcast fallback is present. Retrying without operator action is
    /// pointless.
    #[error("No extension channel available: {message}")]
    ChannelUnavailable {
        /// Description of the missing channel.
        message: String,
    },

    /// The channel reported delivery failure for this request.
    ///
    /// The transport exists but rejected the message. Safe to retry.
    #[error("Request rejected by channel: {message}")]
    RequestRejected {
        /// Description of the delivery failure.
        message: String,
    },

    /// No correlated response arrived within the timeout window.
    ///
    /// The broadcast fallback produced no event matching this request's
    /// ID within the bound. Safe to retry with backoff at the caller's
    /// discretion; the transport itself never retries.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    TransportTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Provider Errors
    // ========================================================================
    /// Provider-side failure surfaced through the channel.
    ///
    /// The extension delivered the request but the load board reported an
    /// error. Retryable.
    #[error("Provider {provider} rejected search: {message}")]
    ProviderRejected {
        /// Provider tag ("DAT" or "SYLECTUS").
        provider: String,
        /// Error message from the provider.
        message: String,
    },

    // ========================================================================
    // Extraction Errors
    // ========================================================================
    /// One malformed HTML result row.
    ///
    /// Caught inside the extractor: the row is logged and skipped, and the
    /// remaining rows are still extracted. Never propagates past the
    /// extractor boundary.
    #[error("Failed to extract row {row}: {message}")]
    ExtractionRow {
        /// Zero-based row index within the results table.
        row: usize,
        /// Description of the malformation.
        message: String,
    },

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// Key/value storage operation failed.
    ///
    /// Write-side failures propagate; read-side corruption is tolerated at
    /// the store boundary and reset to an empty collection.
    #[error("Persistence error for key '{key}': {message}")]
    Persistence {
        /// Storage key involved.
        key: String,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal correlation channel closed before a response arrived.
    #[error("Correlation channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a channel-unavailable error.
    #[inline]
    pub fn channel_unavailable(message: impl Into<String>) -> Self {
        Self::ChannelUnavailable {
            message: message.into(),
        }
    }

    /// Creates a request-rejected error.
    #[inline]
    pub fn request_rejected(message: impl Into<String>) -> Self {
        Self::RequestRejected {
            message: message.into(),
        }
    }

    /// Creates a transport timeout error.
    #[inline]
    pub fn transport_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::TransportTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a provider-rejected error.
    #[inline]
    pub fn provider_rejected(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderRejected {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates an extraction row error.
    #[inline]
    pub fn extraction_row(row: usize, message: impl Into<String>) -> Self {
        Self::ExtractionRow {
            row,
            message: message.into(),
        }
    }

    /// Creates a persistence error.
    #[inline]
    pub fn persistence(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            key: key.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TransportTimeout { .. })
    }

    /// Returns `true` if this is a transport-layer error.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::ChannelUnavailable { .. }
                | Self::RequestRejected { .. }
                | Self::TransportTimeout { .. }
        )
    }

    /// Returns `true` if this error is retryable.
    ///
    /// [`Error::ChannelUnavailable`] is terminal: no transport is present
    /// at all. Everything else at the transport/provider layer may succeed
    /// on retry.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RequestRejected { .. }
                | Self::TransportTimeout { .. }
                | Self::ProviderRejected { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::channel_unavailable("no runtime");
        assert_eq!(
            err.to_string(),
            "No extension channel available: no runtime"
        );
    }

    #[test]
    fn test_timeout_display() {
        let id = RequestId::generate();
        let err = Error::transport_timeout(id, 5000);
        assert!(err.to_string().contains("5000ms"));
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::transport_timeout(RequestId::generate(), 5000);
        let other_err = Error::request_rejected("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_transport_error() {
        assert!(Error::channel_unavailable("x").is_transport_error());
        assert!(Error::request_rejected("x").is_transport_error());
        assert!(!Error::persistence("lanes", "x").is_transport_error());
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::request_rejected("x").is_retryable());
        assert!(Error::provider_rejected("DAT", "x").is_retryable());
        assert!(!Error::channel_unavailable("x").is_retryable());
        assert!(!Error::persistence("lanes", "x").is_retryable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
