//! Single-listener fan-out of configuration change events.

use crate::core::{ChangeEvent, Configer};
use crate::error::{Result, RuntimeError};
use crate::notify::InitRegistry;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[cfg(feature = "metrics")]
use crate::metrics::PoolMetrics;

#[cfg(feature = "metrics")]
type ListenerMetrics = Option<PoolMetrics>;
#[cfg(not(feature = "metrics"))]
type ListenerMetrics = ();

/// Observable state of a [`Supervisor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No listener has been started.
    Unattached,
    /// The listener task is running.
    Listening,
    /// The listener was stopped, or its provider went away.
    Stopped,
}

enum Slot {
    Unattached,
    Listening {
        stop_tx: mpsc::Sender<()>,
        task: JoinHandle<()>,
    },
    Stopped,
}

/// Listens to one configuration provider and re-runs the [`InitRegistry`] on
/// every change event.
///
/// At most one listener exists per supervisor: [`attach`](Self::attach) is a
/// no-op while listening. [`stop`](Self::stop) signals the listener without
/// blocking and re-arms the supervisor so a later `attach` starts a fresh one.
pub struct Supervisor {
    registry: Arc<InitRegistry>,
    slot: Mutex<Slot>,
    #[cfg(feature = "metrics")]
    metrics: Option<PoolMetrics>,
}

impl Supervisor {
    /// Create an unattached supervisor that notifies `registry`.
    pub fn new(registry: Arc<InitRegistry>) -> Self {
        Self {
            registry,
            slot: Mutex::new(Slot::Unattached),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Count fanned-out change events in `metrics`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: PoolMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The registry this supervisor notifies.
    pub fn registry(&self) -> &Arc<InitRegistry> {
        &self.registry
    }

    /// Start listening to `provider` unless a listener is already running.
    ///
    /// Returns `Ok(true)` if this call started the listener.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NoAsyncRuntime`] when called outside a tokio runtime.
    pub fn attach(&self, provider: &dyn Configer) -> Result<bool> {
        let handle =
            Handle::try_current().map_err(|_| RuntimeError::NoAsyncRuntime("change listener"))?;

        let mut slot = self.slot.lock();
        if let Slot::Listening { task, .. } = &*slot {
            if !task.is_finished() {
                return Ok(false);
            }
        }

        let changes = provider.subscribe();
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let registry = Arc::clone(&self.registry);
        let metrics = self.listener_metrics();

        let task = handle.spawn(listen(changes, stop_rx, registry, metrics));

        *slot = Slot::Listening { stop_tx, task };
        tracing::debug!("configuration change listener started");
        Ok(true)
    }

    /// Signal the listener to exit and re-arm the supervisor.
    ///
    /// The signal is sent only if none is already queued. Returns the listener
    /// task so callers that need to can await its exit.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Stopped) {
            Slot::Listening { stop_tx, task } => {
                // Full means a stop is already pending.
                let _ = stop_tx.try_send(());
                Some(task)
            }
            Slot::Unattached => {
                *slot = Slot::Unattached;
                None
            }
            Slot::Stopped => None,
        }
    }

    #[cfg(feature = "metrics")]
    fn listener_metrics(&self) -> ListenerMetrics {
        self.metrics.clone()
    }

    #[cfg(not(feature = "metrics"))]
    fn listener_metrics(&self) -> ListenerMetrics {}

    /// Current state.
    pub fn state(&self) -> SupervisorState {
        match &*self.slot.lock() {
            Slot::Unattached => SupervisorState::Unattached,
            Slot::Listening { task, .. } if !task.is_finished() => SupervisorState::Listening,
            _ => SupervisorState::Stopped,
        }
    }

    /// Whether a listener is running.
    pub fn is_listening(&self) -> bool {
        self.state() == SupervisorState::Listening
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

async fn listen(
    mut changes: broadcast::Receiver<ChangeEvent>,
    mut stop_rx: mpsc::Receiver<()>,
    registry: Arc<InitRegistry>,
    metrics: ListenerMetrics,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop_rx.recv() => break,
            event = changes.recv() => {
                match event {
                    Ok(event) => {
                        tracing::debug!(source = %event.source, version = event.version, "configuration changed");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Callbacks re-read the latest values, so one run covers the skipped events.
                        tracing::warn!(skipped, "change listener lagged behind");
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("configuration provider closed");
                        break;
                    }
                }
                record_change(&metrics);
                registry.invoke_all();
            }
        }
    }
    tracing::debug!("configuration change listener stopped");
}

#[cfg(feature = "metrics")]
fn record_change(metrics: &ListenerMetrics) {
    if let Some(metrics) = metrics {
        metrics.record_change_event();
    }
}

#[cfg(not(feature = "metrics"))]
fn record_change(_metrics: &ListenerMetrics) {}
