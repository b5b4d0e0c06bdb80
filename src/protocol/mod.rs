//! Extension message protocol types.
//!
//! This module defines the message format for communication between the
//! dashboard page (this crate) and the cooperating browser extension.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`OutboundMessage`] | Page → Extension | Command request |
//! | [`ExtensionResponse`] | Extension → Page | Command response |
//! | [`PushEvent`] | Extension → Page | Unsolicited notification |
//!
//! Messages are JSON objects discriminated by a `type` field. No schema is
//! enforced beyond `type`: provider payloads stay loosely shaped
//! (`serde_json::Value`) until a provider adapter normalizes them.
//!
//! # Request Types
//!
//! - `CONNECTION_CHECK` - liveness probe
//! - `PING_DAT_TAB` - manual tab diagnostic
//! - `DAT_SEARCH` / `SYLECTUS_SEARCH` - provider searches
//!
//! # Push Event Types
//!
//! - `EXTENSION_DETECTED`
//! - `DAT_TAB_CONNECTED` / `DAT_TAB_DISCONNECTED`
//! - `DAT_LOADS_RECEIVED`
//! - `DAT_SEARCH_FINDINGS`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `request` | Outbound message, response, broadcast envelope |
//! | `event` | Push event types and typed parsing |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound message, response, and broadcast envelope types.
pub mod request;

/// Push event message types.
pub mod event;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{EventFamily, ParsedEvent, PushEvent};
pub use request::{
    BROADCAST_SOURCE, BROADCAST_TARGET, BroadcastFrame, ExtensionResponse, MessageType,
    OutboundMessage,
};
