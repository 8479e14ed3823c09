//! Configuration source trait.

use crate::error::Result;
use std::collections::HashMap;
use std::path::Path;

/// Trait for configuration sources.
///
/// A source produces a raw key-value tree which the [`ConfigLoader`](crate::core::ConfigLoader)
/// merges with other sources by priority and flattens into string values.
pub trait ConfigSource: Send + Sync {
    /// Load configuration as a raw key-value map.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed. The loader keeps
    /// the previously published values when this happens during a reload.
    fn load(&self) -> Result<HashMap<String, config::Value>>;

    /// Get a human-readable name for this source (for logging/debugging).
    fn name(&self) -> String;

    /// Get the priority of this source (higher = takes precedence).
    ///
    /// Default priorities:
    /// - Environment variables: 300
    /// - In-memory values: 200
    /// - Files: 100
    fn priority(&self) -> i32 {
        100
    }

    /// Path on disk backing this source, if any. Used to set up file watching.
    fn watch_path(&self) -> Option<&Path> {
        None
    }

    /// Whether the source has delivered its initial contents. Sources filled
    /// asynchronously report `false` until then.
    fn is_ready(&self) -> bool {
        true
    }
}
