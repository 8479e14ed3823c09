//! In-memory configuration source.

use super::ConfigSource;
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Programmatic configuration source backed by a shared map.
///
/// Clones share the same values, so a test or an embedding application can keep
/// a handle, mutate it and then trigger a reload of the configuration that owns
/// the source.
///
/// # Examples
///
/// ```rust
/// use hotswap_runtime::sources::{ConfigSource, MemorySource};
///
/// let source = MemorySource::new().with_value("LOG_TIME_GROUP", "hour");
/// source.set("LOG_ENABLE_LEVEL", "warn");
/// assert_eq!(source.load().unwrap().len(), 2);
/// ```
#[derive(Clone)]
pub struct MemorySource {
    values: Arc<RwLock<HashMap<String, String>>>,
    ready: Arc<AtomicBool>,
    priority: i32,
}

impl MemorySource {
    /// Create an empty in-memory source.
    pub fn new() -> Self {
        Self {
            values: Arc::default(),
            ready: Arc::new(AtomicBool::new(true)),
            priority: 200,
        }
    }

    /// Create a source that reports itself not ready until
    /// [`mark_ready`](Self::mark_ready), like a remote store still fetching.
    pub fn pending() -> Self {
        let source = Self::new();
        source.ready.store(false, Ordering::Release);
        source
    }

    /// Flag the initial contents as delivered. Shared by all clones.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Builder-style insert.
    pub fn with_value(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Insert or replace a value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    /// Remove a value, returning the previous one.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.write().remove(key)
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for MemorySource {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        Ok(self
            .values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), config::Value::from(v.as_str())))
            .collect())
    }

    fn name(&self) -> String {
        "memory".to_string()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_values() {
        let source = MemorySource::new();
        let handle = source.clone();
        handle.set("LOG_DIR", "/srv/logs");

        let map = source.load().unwrap();
        assert_eq!(
            map.get("LOG_DIR").cloned().unwrap().into_string().unwrap(),
            "/srv/logs"
        );

        assert_eq!(source.remove("LOG_DIR").as_deref(), Some("/srv/logs"));
        assert!(handle.load().unwrap().is_empty());
    }

    #[test]
    fn test_pending_until_marked_ready() {
        let source = MemorySource::pending();
        let handle = source.clone();
        assert!(!source.is_ready());

        handle.mark_ready();
        assert!(source.is_ready());
        assert!(MemorySource::new().is_ready());
    }

    #[test]
    fn test_priority() {
        assert_eq!(MemorySource::new().priority(), 200);
        assert_eq!(MemorySource::new().with_priority(50).priority(), 50);
    }
}
