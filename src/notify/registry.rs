//! Named init callbacks re-run on every configuration change.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// A shared init callback.
pub type InitCallback = Arc<dyn Fn() + Send + Sync>;

/// Registry of named, zero-argument init callbacks.
///
/// Registering under an existing name replaces the previous callback. Callbacks
/// are invoked once at startup and again after every configuration change; the
/// order across names is unspecified.
///
/// # Examples
///
/// ```rust
/// use hotswap_runtime::notify::InitRegistry;
///
/// let registry = InitRegistry::new();
/// registry.register("cache", || println!("rebuild cache"));
/// registry.register("cache", || println!("replaced"));
///
/// assert_eq!(registry.len(), 1);
/// registry.invoke_all();
/// ```
#[derive(Default)]
pub struct InitRegistry {
    callbacks: RwLock<HashMap<String, InitCallback>>,
}

impl InitRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name`, replacing any previous one.
    pub fn register<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register_shared(name, Arc::new(callback));
    }

    /// Register an already shared callback under `name`.
    pub fn register_shared(&self, name: impl Into<String>, callback: InitCallback) {
        let name = name.into();
        if self
            .callbacks
            .write()
            .insert(name.clone(), callback)
            .is_some()
        {
            tracing::debug!(callback = %name, "init callback replaced");
        }
    }

    /// Invoke every registered callback.
    ///
    /// The lock is released before any callback runs, so a callback may itself
    /// register. A panicking callback is logged and does not prevent the others
    /// from running. Returns the number of callbacks that completed.
    pub fn invoke_all(&self) -> usize {
        let snapshot: Vec<(String, InitCallback)> = self
            .callbacks
            .read()
            .iter()
            .map(|(name, f)| (name.clone(), Arc::clone(f)))
            .collect();

        let mut completed = 0;
        for (name, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback())) {
                Ok(()) => completed += 1,
                Err(payload) => {
                    let reason = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(callback = %name, %reason, "init callback panicked");
                }
            }
        }
        completed
    }

    /// Whether a callback is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.callbacks.read().contains_key(name)
    }

    /// Registered callback names, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.callbacks.read().keys().cloned().collect()
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Whether no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_register_and_invoke() {
        let registry = InitRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        registry.register("count", move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.invoke_all(), 1);
        assert_eq!(registry.invoke_all(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_same_name_replaces() {
        let registry = InitRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&first);
        registry.register("init", move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        let s = Arc::clone(&second);
        registry.register("init", move || {
            s.fetch_add(1, Ordering::SeqCst);
        });

        registry.invoke_all();
        assert_eq!(registry.len(), 1);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_callback_is_isolated() {
        let registry = InitRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.register("broken", || panic!("bad config"));
        let c = Arc::clone(&counter);
        registry.register("healthy", move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.invoke_all(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(registry.invoke_all(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callback_may_register() {
        let registry = Arc::new(InitRegistry::new());
        let inner = Arc::clone(&registry);
        registry.register("outer", move || {
            inner.register("late", || {});
        });

        registry.invoke_all();
        assert!(registry.contains("late"));
        assert_eq!(registry.names().len(), 2);
    }
}
