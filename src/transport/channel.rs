//! Channel strategy traits.
//!
//! The bridge is generic over how bytes actually reach the extension.
//! Two seams cover the observed strategies:
//!
//! - [`DirectChannel`] - a cross-context call with native request/response
//!   pairing (the extension runtime addressed by a fixed identifier).
//! - [`BroadcastChannel`] - a window-scoped fire-and-forget post; pairing
//!   is the bridge's job via `requestId` correlation.
//!
//! Production wiring installs adapters over the page/extension boundary;
//! tests install in-memory fakes.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::protocol::OutboundMessage;

// ============================================================================
// DirectChannel
// ============================================================================

/// A channel with native request/response pairing.
///
/// # Errors
///
/// Implementations distinguish two failure modes:
///
/// - [`Error::ChannelUnavailable`](crate::Error::ChannelUnavailable) -
///   the runtime reports no receiver at all (channel absent). The bridge
///   falls through to the broadcast strategy.
/// - [`Error::RequestRejected`](crate::Error::RequestRejected) - the
///   channel exists but reported delivery failure. Surfaced to the caller
///   as a rejection.
#[async_trait]
pub trait DirectChannel: Send + Sync {
    /// Sends a message to the extension and awaits its paired response.
    async fn request(&self, message: &OutboundMessage) -> Result<Value>;
}

// ============================================================================
// BroadcastChannel
// ============================================================================

/// A window-scoped broadcast primitive.
///
/// Posting is fire-and-forget; the bridge correlates responses itself.
/// Incoming frames are pushed into the bridge via
/// [`ExtensionBridge::deliver`](crate::transport::ExtensionBridge::deliver)
/// by whoever owns the inbound side of the channel.
pub trait BroadcastChannel: Send + Sync {
    /// Posts an envelope to the broadcast channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestRejected`](crate::Error::RequestRejected)
    /// if the post could not be delivered.
    fn post(&self, envelope: Value) -> Result<()>;
}

// ============================================================================
// Test Fakes
// ============================================================================
