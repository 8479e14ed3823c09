//! Named configuration instances selected by source kind.

use crate::core::ReloadableConfig;
use crate::error::Result;
use crate::sources::{MemorySource, ParseType};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Where a named configuration is loaded from.
#[derive(Clone, Default)]
pub enum SourceKind {
    /// `{config_dir}/{name}.{ext}` on the local filesystem.
    #[default]
    Local,
    /// A programmatic in-memory source.
    Memory(MemorySource),
}

/// Creates and caches configuration instances by name.
///
/// The first successful [`instance`](Self::instance) call for a name builds and
/// caches the configuration; later calls return the cached handle. A failed
/// load is not cached, so callers can retry.
pub struct ConfigManager {
    config_dir: PathBuf,
    env_prefix: Option<String>,
    file_watch: bool,
    debounce: Duration,
    instances: Mutex<HashMap<String, Arc<ReloadableConfig>>>,
}

impl ConfigManager {
    /// Create a manager resolving local configurations under `config_dir`.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            env_prefix: None,
            file_watch: cfg!(feature = "file-watch"),
            debounce: Duration::from_millis(500),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Overlay `{prefix}_*` environment variables on every instance.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enable or disable file watching for local instances.
    pub fn with_file_watch(mut self, enabled: bool) -> Self {
        self.file_watch = enabled && cfg!(feature = "file-watch");
        self
    }

    /// Debounce applied to file-triggered reloads.
    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Directory local configurations are resolved in.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the local file backing configuration `name`.
    pub fn local_path(&self, name: &str, parse_type: ParseType) -> PathBuf {
        self.config_dir
            .join(format!("{}.{}", name, parse_type.extension()))
    }

    /// Get or create the configuration named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing source cannot be loaded.
    pub fn instance(
        &self,
        name: &str,
        parse_type: ParseType,
        source: &SourceKind,
    ) -> Result<Arc<ReloadableConfig>> {
        let mut instances = self.instances.lock();
        if let Some(existing) = instances.get(name) {
            return Ok(Arc::clone(existing));
        }

        let mut builder =
            ReloadableConfig::builder(name).with_watch_debounce(self.debounce);

        builder = match source {
            SourceKind::Local => {
                let path = self.local_path(name, parse_type);
                let builder = builder.with_source(
                    crate::sources::FileSource::with_format(path, parse_type),
                );
                #[cfg(feature = "file-watch")]
                let builder = builder.with_file_watch(self.file_watch);
                builder
            }
            SourceKind::Memory(memory) => builder.with_source(memory.clone()),
        };

        if let Some(prefix) = &self.env_prefix {
            builder = builder.with_env_overrides(prefix, "__");
        }

        let config = builder.build()?;
        instances.insert(name.to_string(), Arc::clone(&config));
        tracing::info!(config = %name, "configuration instance created");
        Ok(config)
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    /// Whether no instance has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
