//! Correlation bridge and push dispatch.
//!
//! [`ExtensionBridge`] delivers a single logical request to the extension
//! and resolves exactly one matching response, or fails. Unsolicited push
//! events are dispatched by type to at most one registered callback per
//! event family.
//!
//! # Correlation
//!
//! The direct channel pairs requests and responses natively. On the
//! broadcast fallback, the bridge attaches a fresh [`RequestId`] to the
//! outgoing envelope and parks a oneshot sender in a correlation map; the
//! first incoming frame carrying the recognized source marker and the
//! same `requestId` resolves it and removes the entry. A request that
//! sees no matching frame within the timeout window removes its entry and
//! rejects - every outstanding request has a finite lifetime.
//!
//! # Concurrency
//!
//! Multiple concurrent `send` calls are independent: each owns its own
//! `RequestId` and correlation slot, so overlap is safe. The bridge
//! performs no automatic retry.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{BroadcastFrame, EventFamily, ExtensionResponse, OutboundMessage, PushEvent};

use super::channel::{BroadcastChannel, DirectChannel};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for broadcast correlation (5s).
const DEFAULT_BROADCAST_TIMEOUT: Duration = Duration::from_millis(5000);

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Value>>;

/// Push event callback type.
///
/// Called for each push event of the registered family. Registration is
/// replace-on-register: only the latest callback per family wins.
pub type PushHandler = Box<dyn Fn(PushEvent) + Send + Sync>;

// ============================================================================
// BridgeConfig
// ============================================================================

/// Bridge timing configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// How long a broadcast request waits for a correlated frame.
    pub broadcast_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            broadcast_timeout: DEFAULT_BROADCAST_TIMEOUT,
        }
    }
}

// ============================================================================
// ExtensionBridge
// ============================================================================

/// Request/response and push-event channel to the extension.
///
/// Strategies are attempted in priority order: the direct channel when
/// installed, then the broadcast fallback. A bridge with neither channel
/// rejects every send with
/// [`Error::ChannelUnavailable`](crate::Error::ChannelUnavailable).
pub struct ExtensionBridge {
    /// Timing configuration.
    config: BridgeConfig,
    /// Direct channel strategy, when installed.
    direct: Option<Arc<dyn DirectChannel>>,
    /// Broadcast fallback strategy, when installed.
    broadcast: Option<Arc<dyn BroadcastChannel>>,
    /// Pending broadcast correlations.
    correlation: Mutex<CorrelationMap>,
    /// Single-slot push callbacks per event family.
    handlers: Mutex<FxHashMap<EventFamily, PushHandler>>,
}

impl ExtensionBridge {
    /// Creates a bridge with no channels installed.
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            direct: None,
            broadcast: None,
            correlation: Mutex::new(CorrelationMap::default()),
            handlers: Mutex::new(FxHashMap::default()),
        }
    }

    /// Installs the direct channel strategy.
    #[must_use]
    pub fn with_direct(mut self, channel: Arc<dyn DirectChannel>) -> Self {
        self.direct = Some(channel);
        self
    }

    /// Installs the broadcast fallback strategy.
    #[must_use]
    pub fn with_broadcast(mut self, channel: Arc<dyn BroadcastChannel>) -> Self {
        self.broadcast = Some(channel);
        self
    }

    /// Sends a request and awaits exactly one matching response.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelUnavailable`] - no transport present at all
    ///   (terminal, do not retry)
    /// - [`Error::RequestRejected`] - a channel reported delivery failure
    ///   (safe to retry)
    /// - [`Error::TransportTimeout`] - the broadcast path produced no
    ///   matching frame within the window (safe to retry with backoff at
    ///   the caller's discretion; the bridge never retries)
    pub async fn send(&self, message: OutboundMessage) -> Result<ExtensionResponse> {
        if let Some(direct) = &self.direct {
            match direct.request(&message).await {
                Ok(value) => {
                    trace!(message_type = message.message_type.as_str(), "Direct response");
                    return Ok(ExtensionResponse::new(value));
                }

                // Channel reports total absence: fall through to broadcast.
                Err(Error::ChannelUnavailable { message: reason }) => {
                    debug!(
                        message_type = message.message_type.as_str(),
                        reason = %reason,
                        "Direct channel absent, trying broadcast fallback"
                    );
                }

                // Delivery failure is surfaced as a rejection, not retried
                // here. Callers treat it the same as a rejected promise.
                Err(err) => return Err(err),
            }
        }

        self.send_broadcast(message).await
    }

    /// Sends a request over the broadcast fallback with correlation.
    async fn send_broadcast(&self, message: OutboundMessage) -> Result<ExtensionResponse> {
        let Some(broadcast) = &self.broadcast else {
            return Err(Error::channel_unavailable(
                "neither direct nor broadcast channel installed",
            ));
        };

        let request_id = RequestId::generate();
        let (tx, rx) = oneshot::channel();

        // Register the one-time filter before posting.
        self.correlation.lock().insert(request_id, tx);

        let envelope = match message.into_broadcast(request_id) {
            Ok(envelope) => envelope,
            Err(err) => {
                self.correlation.lock().remove(&request_id);
                return Err(err);
            }
        };

        if let Err(err) = broadcast.post(envelope) {
            self.correlation.lock().remove(&request_id);
            return Err(err);
        }

        trace!(%request_id, "Broadcast request posted");

        match timeout(self.config.broadcast_timeout, rx).await {
            Ok(Ok(value)) => Ok(ExtensionResponse::new(value)),
            Ok(Err(recv_err)) => Err(Error::ChannelClosed(recv_err)),
            Err(_) => {
                // Timeout: remove the filter so a late frame is a no-op.
                self.correlation.lock().remove(&request_id);
                Err(Error::transport_timeout(
                    request_id,
                    self.config.broadcast_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Handles an incoming broadcast frame.
    ///
    /// Called by the owner of the inbound side of the broadcast channel.
    /// Frames correlating to a pending request resolve it; frames without
    /// a `requestId` are dispatched as push events; frames missing the
    /// recognized source marker, or arriving after their filter was
    /// removed, are dropped.
    pub fn deliver(&self, frame: Value) {
        let frame = match BroadcastFrame::from_value(frame) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "Failed to parse incoming broadcast frame");
                return;
            }
        };

        if !frame.is_from_extension() {
            trace!("Dropping frame without recognized source marker");
            return;
        }

        if let Some(request_id) = frame.request_id {
            let tx = self.correlation.lock().remove(&request_id);

            match tx {
                Some(tx) => {
                    let _ = tx.send(frame.body);
                }
                None => {
                    trace!(%request_id, "Late frame for removed filter, dropping");
                }
            }

            return;
        }

        if let Some(event_type) = frame.event_type {
            self.deliver_push(PushEvent::new(event_type, frame.body));
        }
    }

    /// Dispatches a push event to the registered callback for its family.
    ///
    /// Events of an unrecognized family, or of a family with no registered
    /// callback, are dropped.
    pub fn deliver_push(&self, event: PushEvent) {
        let Some(family) = event.family() else {
            trace!(event_type = %event.event_type, "Dropping push event of unknown family");
            return;
        };

        let handlers = self.handlers.lock();
        if let Some(handler) = handlers.get(&family) {
            handler(event);
        } else {
            trace!(?family, "No callback registered for push family");
        }
    }

    /// Registers or clears the push callback for an event family.
    ///
    /// Registration is replace-on-register: the latest callback wins.
    /// Passing `None` unregisters explicitly.
    pub fn on_event(&self, family: EventFamily, handler: Option<PushHandler>) {
        let mut handlers = self.handlers.lock();
        match handler {
            Some(handler) => {
                handlers.insert(family, handler);
            }
            None => {
                handlers.remove(&family);
            }
        }
    }

    /// Returns the number of pending broadcast correlations.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }
}

// ============================================================================
// Tests
// ============================================================================
