//! Extension connection monitor.
//!
//! Periodic liveness probing built atop the transport. The monitor owns a
//! three-state machine (`Unknown` → `Connected` / `Disconnected`) driven
//! by a `CONNECTION_CHECK` probe every 30 seconds, plus a derived boolean
//! for whether a specific downstream DAT tab is currently bridged.
//!
//! Tab-connection push events update the tab flag asynchronously and
//! independently of the probe; they never reset the probe-derived state.
//! Probe failures are silent (logged) - the state reflects
//! `Disconnected` rather than raising an error to the caller.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::protocol::{EventFamily, OutboundMessage, ParsedEvent};
use crate::transport::ExtensionBridge;

// ============================================================================
// Constants
// ============================================================================

/// Default interval between liveness probes (30s).
const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// ConnectionState
// ============================================================================

/// Probe-derived extension connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No probe has completed yet.
    Unknown,
    /// The last probe got a positive response.
    Connected,
    /// The last probe was rejected or answered negatively.
    Disconnected,
}

// ============================================================================
// MonitorConfig
// ============================================================================

/// Monitor timing configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between liveness probes.
    pub probe_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: DEFAULT_PROBE_INTERVAL,
        }
    }
}

// ============================================================================
// ConnectionMonitor
// ============================================================================

/// Periodic liveness monitor for the extension bridge.
///
/// # Example
///
/// ```ignore
/// let monitor = ConnectionMonitor::new(bridge, MonitorConfig::default());
/// monitor.start();
///
/// if monitor.state() == ConnectionState::Connected {
///     // extension is reachable
/// }
/// ```
pub struct ConnectionMonitor {
    /// Transport used for probes.
    bridge: Arc<ExtensionBridge>,
    /// Timing configuration.
    config: MonitorConfig,
    /// Probe-derived state.
    state: Arc<Mutex<ConnectionState>>,
    /// Whether a DAT tab is currently bridged (push-derived).
    tab_connected: Arc<AtomicBool>,
    /// Probe loop task, when started.
    probe_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionMonitor {
    /// Creates a monitor over the given bridge.
    #[must_use]
    pub fn new(bridge: Arc<ExtensionBridge>, config: MonitorConfig) -> Self {
        Self {
            bridge,
            config,
            state: Arc::new(Mutex::new(ConnectionState::Unknown)),
            tab_connected: Arc::new(AtomicBool::new(false)),
            probe_task: Mutex::new(None),
        }
    }

    /// Starts the probe loop and registers the tab push handler.
    ///
    /// Probes immediately, then every `probe_interval`. Calling `start`
    /// again replaces the previous loop.
    pub fn start(&self) {
        // Tab push events only flip the tab flag; the probe-derived state
        // is untouched.
        {
            let tab_connected = Arc::clone(&self.tab_connected);
            self.bridge.on_event(
                EventFamily::TabConnection,
                Some(Box::new(move |event| match event.parse() {
                    ParsedEvent::DatTabConnected => {
                        trace!("DAT tab bridged");
                        tab_connected.store(true, Ordering::Relaxed);
                    }
                    ParsedEvent::DatTabDisconnected => {
                        trace!("DAT tab unbridged");
                        tab_connected.store(false, Ordering::Relaxed);
                    }
                    _ => {}
                })),
            );
        }

        let bridge = Arc::clone(&self.bridge);
        let state = Arc::clone(&self.state);
        let interval = self.config.probe_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                Self::probe(&bridge, &state).await;
            }
        });

        if let Some(previous) = self.probe_task.lock().replace(task) {
            previous.abort();
        }
    }

    /// Stops the probe loop.
    pub fn stop(&self) {
        if let Some(task) = self.probe_task.lock().take() {
            task.abort();
        }
    }

    /// Issues one liveness probe and records the transition.
    async fn probe(bridge: &ExtensionBridge, state: &Mutex<ConnectionState>) {
        let next = match bridge.send(OutboundMessage::connection_check()).await {
            Ok(response) if response.get_bool("connected") => ConnectionState::Connected,
            Ok(_) => ConnectionState::Disconnected,
            Err(err) => {
                // Silent failure: the state carries the information.
                debug!(error = %err, "Liveness probe failed");
                ConnectionState::Disconnected
            }
        };

        let mut current = state.lock();
        if *current != next {
            debug!(from = ?*current, to = ?next, "Connection state transition");
        }
        *current = next;
    }

    /// Returns the probe-derived connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Returns `true` if a DAT tab is currently bridged.
    #[inline]
    #[must_use]
    pub fn tab_connected(&self) -> bool {
        self.tab_connected.load(Ordering::Relaxed)
    }

    /// Manual diagnostic ping of the DAT tab.
    ///
    /// Result is advisory text only; no state transition occurs.
    pub async fn ping(&self) -> String {
        match self.bridge.send(OutboundMessage::ping_dat_tab()).await {
            Ok(response) => {
                let message = response.get_string("message");
                if message.is_empty() {
                    "DAT tab responded".to_string()
                } else {
                    message
                }
            }
            Err(err) => format!("Ping failed: {err}"),
        }
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Tests
// ============================================================================
