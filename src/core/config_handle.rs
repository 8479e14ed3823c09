//! The reloadable configuration handle providing lock-free lookups.

use crate::core::loader::normalize_key;
use crate::core::{ChangeEvent, ConfigLoader, Configer};
use crate::error::{Result, RuntimeError};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

#[cfg(feature = "file-watch")]
use crate::notify::ConfigWatcher;

/// Capacity of the change-event channel of each configuration.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// A named configuration whose values are swapped atomically on reload.
///
/// Reads go through `arc-swap` and never block a concurrent reload. Every
/// successful [`reload`](Self::reload) publishes a [`ChangeEvent`].
///
/// # Examples
///
/// ```rust
/// use hotswap_runtime::core::{Configer, ReloadableConfig};
/// use hotswap_runtime::sources::MemorySource;
///
/// let source = MemorySource::new().with_value("LOG_DIR", "/srv/logs");
/// let config = ReloadableConfig::builder("app")
///     .with_source(source.clone())
///     .build()
///     .unwrap();
///
/// assert_eq!(config.get_string("log_dir").unwrap(), "/srv/logs");
///
/// source.set("LOG_DIR", "/var/log/app");
/// config.reload().unwrap();
/// assert_eq!(config.get_string("LOG_DIR").unwrap(), "/var/log/app");
/// ```
pub struct ReloadableConfig {
    name: String,
    values: ArcSwap<HashMap<String, String>>,
    loader: ConfigLoader,
    changes: broadcast::Sender<ChangeEvent>,
    version: AtomicU64,
    #[cfg(feature = "file-watch")]
    watcher: parking_lot::Mutex<Option<ConfigWatcher>>,
}

impl ReloadableConfig {
    /// Create a new builder for a configuration named `name`.
    pub fn builder(name: impl Into<String>) -> crate::core::ReloadableConfigBuilder {
        crate::core::ReloadableConfigBuilder::new(name)
    }

    /// Perform the initial load. Fails if the sources cannot be read.
    pub(crate) fn load(name: String, loader: ConfigLoader) -> Result<Self> {
        let initial = loader.load()?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        tracing::debug!(config = %name, keys = initial.len(), "configuration loaded");

        Ok(Self {
            name,
            values: ArcSwap::from_pointee(initial),
            loader,
            changes,
            version: AtomicU64::new(0),
            #[cfg(feature = "file-watch")]
            watcher: parking_lot::Mutex::new(None),
        })
    }

    #[cfg(feature = "file-watch")]
    pub(crate) fn attach_watcher(&self, watcher: ConfigWatcher) {
        *self.watcher.lock() = Some(watcher);
    }

    /// Name of this configuration instance.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of all current values.
    pub fn snapshot(&self) -> Arc<HashMap<String, String>> {
        self.values.load_full()
    }

    /// Number of successful reloads so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Reload from all sources and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error if any source fails; the previous values are kept and
    /// no change event is published.
    pub fn reload(&self) -> Result<()> {
        let values = self.loader.load().inspect_err(|e| {
            tracing::warn!(config = %self.name, error = %e, "reload failed, keeping previous values");
        })?;

        self.values.store(Arc::new(values));
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;

        // No receivers is fine; nobody is listening yet.
        let _ = self.changes.send(ChangeEvent {
            version,
            source: self.name.clone(),
        });

        tracing::debug!(config = %self.name, version, "configuration reloaded");
        Ok(())
    }

    /// Whether a file watcher is driving reloads of this configuration.
    #[cfg(feature = "file-watch")]
    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_some()
    }
}

impl Configer for ReloadableConfig {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .load()
            .get(&normalize_key(key))
            .cloned()
            .ok_or_else(|| RuntimeError::KeyNotFound(key.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn is_loaded(&self) -> bool {
        self.loader.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MemorySource;

    fn config_with(source: &MemorySource) -> ReloadableConfig {
        let mut loader = ConfigLoader::new();
        loader.add_source(Box::new(source.clone()));
        ReloadableConfig::load("test".to_string(), loader).unwrap()
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let source = MemorySource::new().with_value("LOG_DIR", "/srv/logs");
        let config = config_with(&source);

        assert_eq!(config.get_string("LOG_DIR").unwrap(), "/srv/logs");
        assert_eq!(config.get_string("log_dir").unwrap(), "/srv/logs");
        assert!(matches!(
            config.get_string("missing"),
            Err(RuntimeError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_is_loaded_follows_source_readiness() {
        let source = MemorySource::pending().with_value("LOG_DIR", "/srv/logs");
        let config = config_with(&source);
        assert!(!config.is_loaded());

        source.mark_ready();
        assert!(config.is_loaded());
        assert!(config_with(&MemorySource::new()).is_loaded());
    }

    #[test]
    fn test_get_string_or_treats_empty_as_missing() {
        let source = MemorySource::new().with_value("EMPTY", "");
        let config = config_with(&source);

        assert_eq!(config.get_string_or("EMPTY", "fallback"), "fallback");
        assert_eq!(config.get_string_or("ABSENT", "fallback"), "fallback");
    }

    #[tokio::test]
    async fn test_reload_publishes_change_event() {
        let source = MemorySource::new().with_value("LOG_ENABLE_LEVEL", "info");
        let config = config_with(&source);
        let mut rx = config.subscribe();

        source.set("LOG_ENABLE_LEVEL", "debug");
        config.reload().unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.version, 1);
        assert_eq!(event.source, "test");
        assert_eq!(config.get_string("LOG_ENABLE_LEVEL").unwrap(), "debug");
        assert_eq!(config.version(), 1);
    }

    #[test]
    fn test_snapshot_is_stable_across_reload() {
        let source = MemorySource::new().with_value("A", "1");
        let config = config_with(&source);

        let before = config.snapshot();
        source.set("A", "2");
        config.reload().unwrap();

        assert_eq!(before["a"], "1");
        assert_eq!(config.snapshot()["a"], "2");
    }
}
