//! Environment variable configuration source.

use super::ConfigSource;
use crate::error::{Result, RuntimeError};
use config::Environment;
use std::collections::HashMap;

/// Environment variable configuration source.
///
/// With prefix `APP` and separator `__`, `APP_LOG_DIR=/srv/logs` becomes the
/// key `log_dir` and `APP_SERVER__PORT=8080` becomes `server.port`.
pub struct EnvSource {
    prefix: String,
    separator: String,
    priority: i32,
}

impl EnvSource {
    /// Create a new environment variable source.
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            priority: 300,
        }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl ConfigSource for EnvSource {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        // Values stay strings; lookups are string-typed anyway.
        let env_source = Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .separator(&self.separator);

        let built = config::Config::builder()
            .add_source(env_source)
            .build()
            .map_err(|e| {
                RuntimeError::LoadError(format!("Failed to load environment variables: {}", e))
            })?;

        built
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| {
                RuntimeError::ParseError(format!("Failed to parse environment variables: {}", e))
            })
    }

    fn name(&self) -> String {
        format!("env:{}*", self.prefix)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_source_defaults() {
        let source = EnvSource::new("APP", "__");
        assert_eq!(source.prefix, "APP");
        assert_eq!(source.separator, "__");
        assert_eq!(source.priority(), 300);
        assert_eq!(source.name(), "env:APP*");
    }

    #[test]
    fn test_missing_prefix_loads_empty() {
        let source = EnvSource::new("HOTSWAP_RUNTIME_TEST_UNSET_PREFIX", "__");
        let map = source.load().unwrap();
        assert!(map.is_empty());
    }
}
