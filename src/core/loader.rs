//! Configuration loader that merges multiple sources into flat string values.

use crate::error::{Result, RuntimeError};
use crate::sources::ConfigSource;
use config::ValueKind;
use std::collections::HashMap;
use std::path::PathBuf;

/// Loads and merges configuration from multiple sources.
///
/// Sources are merged in priority order (lower priority first, higher priority
/// sources override). Nested tables are flattened into dotted keys and every
/// key is lower-cased, so `[server] Port = 1` is read back as `server.port`.
pub struct ConfigLoader {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Add a configuration source.
    pub fn add_source(&mut self, source: Box<dyn ConfigSource>) {
        self.sources.push(source);
    }

    /// Load and merge configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if no source is registered or any source fails to load.
    pub fn load(&self) -> Result<HashMap<String, String>> {
        if self.sources.is_empty() {
            return Err(RuntimeError::LoadError(
                "No configuration sources specified".to_string(),
            ));
        }

        let mut merged = HashMap::new();
        for source in self.sorted() {
            let values = source.load().map_err(|e| {
                RuntimeError::LoadError(format!("Failed to load source '{}': {}", source.name(), e))
            })?;

            for (key, value) in values {
                flatten_into(&normalize_key(&key), &value, &mut merged);
            }
        }

        Ok(merged)
    }

    /// Get the list of source names in priority order.
    pub fn source_names(&self) -> Vec<String> {
        self.sorted().iter().map(|s| s.name()).collect()
    }

    /// Paths of file-backed sources, for watching.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        self.sources
            .iter()
            .filter_map(|s| s.watch_path().map(|p| p.to_path_buf()))
            .collect()
    }

    /// Whether every source has delivered its initial contents.
    pub fn is_ready(&self) -> bool {
        self.sources.iter().all(|s| s.is_ready())
    }

    fn sorted(&self) -> Vec<&Box<dyn ConfigSource>> {
        let mut sorted_sources: Vec<_> = self.sources.iter().collect();
        sorted_sources.sort_by_key(|s| s.priority());
        sorted_sources
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Lookup keys are case-insensitive.
pub(crate) fn normalize_key(key: &str) -> String {
    key.to_ascii_lowercase()
}

fn flatten_into(prefix: &str, value: &config::Value, out: &mut HashMap<String, String>) {
    match &value.kind {
        ValueKind::Table(table) => {
            for (key, child) in table {
                let key = format!("{}.{}", prefix, normalize_key(key));
                flatten_into(&key, child, out);
            }
        }
        ValueKind::Array(items) => {
            let rendered: Vec<String> = items
                .iter()
                .filter_map(|item| item.clone().into_string().ok())
                .collect();
            out.insert(prefix.to_string(), rendered.join(","));
        }
        ValueKind::Nil => {
            out.insert(prefix.to_string(), String::new());
        }
        _ => {
            if let Ok(rendered) = value.clone().into_string() {
                out.insert(prefix.to_string(), rendered);
            }
        }
    }
}
