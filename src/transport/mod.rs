//! Extension transport layer.
//!
//! This module delivers requests from the page to the cooperating browser
//! extension and resolves exactly one matching response per request, while
//! surfacing unsolicited push events on a side channel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Page (Rust)    │   direct channel (paired)    │  Extension      │
//! │                 │◄────────────────────────────►│  (privileged    │
//! │  ExtensionBridge│   broadcast + requestId      │   relay)        │
//! │                 │◄────────────────────────────►│                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Strategies
//!
//! 1. **Direct channel** - a cross-context extension call addressed by a
//!    fixed extension identifier, with native request/response pairing.
//! 2. **Broadcast fallback** - a window-scoped broadcast primitive; the
//!    bridge tags each outgoing payload with a fresh `requestId` and
//!    registers a one-time filter that accepts only frames carrying the
//!    recognized source marker and the same `requestId`. No match within
//!    the timeout window fails the call; there is no unbounded-wait state.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | Channel strategy traits |
//! | `bridge` | Correlation bridge and push dispatch |

// ============================================================================
// Submodules
// ============================================================================

/// Channel strategy traits.
pub mod channel;

/// Correlation bridge and push dispatch.
pub mod bridge;

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::{BridgeConfig, ExtensionBridge, PushHandler};
pub use channel::{BroadcastChannel, DirectChannel};
