//! The configuration capability consumed by the supervisor and the bootstrap.

use crate::error::Result;
use tokio::sync::broadcast;

/// Notification that a configuration source has been reloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Monotonically increasing reload counter of the emitting configuration.
    pub version: u64,
    /// Name of the configuration instance that changed.
    pub source: String,
}

/// String-keyed configuration with change notifications.
///
/// Implementations publish a [`ChangeEvent`] on every successful reload. Buffering
/// of events is owned by the implementation: a receiver that falls behind
/// observes `RecvError::Lagged` rather than blocking the publisher.
pub trait Configer: Send + Sync {
    /// Look up a value.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::KeyNotFound`](crate::error::RuntimeError::KeyNotFound)
    /// if the key has no value.
    fn get_string(&self, key: &str) -> Result<String>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Whether the first load has completed. Configurations that load
    /// asynchronously report `false` until their first change event.
    fn is_loaded(&self) -> bool {
        true
    }

    /// Look up a value, falling back to `default` when it is missing or empty.
    fn get_string_or(&self, key: &str, default: &str) -> String {
        match self.get_string(key) {
            Ok(value) if !value.is_empty() => value,
            _ => default.to_string(),
        }
    }
}
