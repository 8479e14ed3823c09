//! Builder for constructing ReloadableConfig instances.

use crate::core::{ConfigLoader, ReloadableConfig};
use crate::error::Result;
use crate::sources::{ConfigSource, EnvSource, FileSource};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "file-watch")]
use crate::error::RuntimeError;

/// Builder for a [`ReloadableConfig`].
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_runtime::core::ReloadableConfig;
///
/// # async fn example() -> hotswap_runtime::error::Result<()> {
/// let config = ReloadableConfig::builder("app")
///     .with_file("conf/app.toml")
///     .with_env_overrides("APP", "__")
///     .with_file_watch(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ReloadableConfigBuilder {
    name: String,
    file_paths: Vec<PathBuf>,
    env_prefix: Option<String>,
    env_separator: Option<String>,
    custom_sources: Vec<Box<dyn ConfigSource>>,
    file_watch: bool,
    debounce: Duration,
}

impl ReloadableConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_paths: Vec::new(),
            env_prefix: None,
            env_separator: None,
            custom_sources: Vec::new(),
            file_watch: false,
            debounce: Duration::from_millis(500),
        }
    }

    /// Add a file source; the format is detected from the extension.
    ///
    /// Later files have higher priority and override earlier files.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_paths.push(path.into());
        self
    }

    /// Overlay environment variables with `prefix`, nesting on `separator`.
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.env_separator = Some(separator.to_string());
        self
    }

    /// Add a custom configuration source.
    pub fn with_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
        self.custom_sources.push(Box::new(source));
        self
    }

    /// Reload automatically when a file source changes on disk.
    ///
    /// Requires a tokio runtime at [`build`](Self::build) time.
    #[cfg(feature = "file-watch")]
    pub fn with_file_watch(mut self, enabled: bool) -> Self {
        self.file_watch = enabled;
        self
    }

    /// Minimum time between two reloads triggered by file events.
    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Load the configuration and, if enabled, start watching its files.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial load fails, or if file watching was
    /// requested outside a tokio runtime or cannot be initialized.
    pub fn build(self) -> Result<Arc<ReloadableConfig>> {
        let mut loader = ConfigLoader::new();

        for (index, path) in self.file_paths.iter().enumerate() {
            let priority = 100 + (index as i32 * 10);
            loader.add_source(Box::new(FileSource::new(path).with_priority(priority)));
        }

        for source in self.custom_sources {
            loader.add_source(source);
        }

        if let (Some(prefix), Some(separator)) = (self.env_prefix, self.env_separator) {
            loader.add_source(Box::new(EnvSource::new(prefix, separator)));
        }

        let watch_paths = loader.watch_paths();
        let config = Arc::new(ReloadableConfig::load(self.name, loader)?);

        #[cfg(feature = "file-watch")]
        if self.file_watch && !watch_paths.is_empty() {
            spawn_file_watch(&config, &watch_paths, self.debounce)?;
        }

        #[cfg(not(feature = "file-watch"))]
        let _ = (watch_paths, self.file_watch, self.debounce);

        Ok(config)
    }
}

#[cfg(feature = "file-watch")]
fn spawn_file_watch(
    config: &Arc<ReloadableConfig>,
    paths: &[PathBuf],
    debounce: Duration,
) -> Result<()> {
    use crate::notify::ConfigWatcher;

    let handle = tokio::runtime::Handle::try_current()
        .map_err(|_| RuntimeError::NoAsyncRuntime("config file watcher"))?;

    let (watcher, mut rx) = ConfigWatcher::new(&handle, debounce)?;
    for path in paths {
        watcher.watch(path)?;
    }

    // The task holds a weak reference: dropping the config drops the watcher,
    // which closes the channel and ends the task.
    let weak = Arc::downgrade(config);
    handle.spawn(async move {
        while rx.recv().await.is_some() {
            let Some(config) = weak.upgrade() else {
                break;
            };
            // Failures are logged by reload and keep the previous values.
            let _ = config.reload();
        }
    });

    config.attach_watcher(watcher);
    Ok(())
}
