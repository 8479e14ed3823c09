//! Startup options for the application runtime.

use crate::core::SourceKind;
use crate::notify::InitCallback;
use crate::pool::LogPoolBuilder;
use crate::sources::ParseType;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default period of the configuration retry loop.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(60);
/// Default wait for the first change event of a configuration that loads asynchronously.
pub const DEFAULT_FIRST_LOAD_TIMEOUT: Duration = Duration::from_secs(3);

/// Which configuration the application reads.
#[derive(Clone)]
pub struct ConfigParams {
    /// Instance name; for local sources also the file stem.
    pub name: String,
    /// File format of local sources.
    pub parse_type: ParseType,
    /// Backend selector.
    pub source: SourceKind,
}

impl Default for ConfigParams {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            parse_type: ParseType::Toml,
            source: SourceKind::Local,
        }
    }
}

/// Options for [`Runtime::start`](crate::runtime::Runtime::start) and
/// [`init_app`](crate::runtime::init_app).
///
/// # Examples
///
/// ```rust
/// use hotswap_runtime::runtime::AppOptions;
/// use hotswap_runtime::sources::ParseType;
/// use std::time::Duration;
///
/// let options = AppOptions::new()
///     .with_debug(true)
///     .with_config_dir("conf")
///     .with_config_name("app", ParseType::Toml)
///     .with_reload_interval(Duration::from_secs(3))
///     .with_init("warm_cache", || {});
///
/// assert!(options.debug);
/// ```
pub struct AppOptions {
    /// Force the debug level on every sink.
    pub debug: bool,
    /// Free-form deployment environment name.
    pub env: String,
    /// Directory local configurations are resolved in.
    pub config_dir: PathBuf,
    /// The configuration to load.
    pub config: ConfigParams,
    /// Overlay `{prefix}_*` environment variables when set.
    pub env_prefix: Option<String>,
    /// Reload local configurations when their files change.
    pub file_watch: bool,
    /// Debounce applied to file-triggered reloads.
    pub watch_debounce: Duration,
    /// Retry period while the configuration cannot be loaded.
    pub reload_interval: Duration,
    /// How long startup waits for an asynchronously loading configuration.
    pub first_load_timeout: Duration,
    pub(crate) init_callbacks: Vec<(String, InitCallback)>,
    pub(crate) pool: LogPoolBuilder,
}

impl AppOptions {
    /// Options with defaults: config `conf/app.toml`, file watching on.
    pub fn new() -> Self {
        Self {
            debug: false,
            env: String::new(),
            config_dir: PathBuf::from("conf"),
            config: ConfigParams::default(),
            env_prefix: None,
            file_watch: cfg!(feature = "file-watch"),
            watch_debounce: Duration::from_millis(500),
            reload_interval: DEFAULT_RELOAD_INTERVAL,
            first_load_timeout: DEFAULT_FIRST_LOAD_TIMEOUT,
            init_callbacks: Vec::new(),
            pool: LogPoolBuilder::new(),
        }
    }

    /// Set the debug flag.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the environment name.
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    /// Set the configuration directory.
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Read the local configuration `{config_dir}/{name}.{ext}`.
    pub fn with_config_name(mut self, name: impl Into<String>, parse_type: ParseType) -> Self {
        self.config.name = name.into();
        self.config.parse_type = parse_type;
        self
    }

    /// Select the configuration backend.
    pub fn with_config_source(mut self, source: SourceKind) -> Self {
        self.config.source = source;
        self
    }

    /// Overlay environment variables with this prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enable or disable file watching.
    pub fn with_file_watch(mut self, enabled: bool) -> Self {
        self.file_watch = enabled;
        self
    }

    /// Debounce for file-triggered reloads.
    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    /// Retry period of the configuration load.
    pub fn with_reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = interval;
        self
    }

    /// How long startup waits for a configuration whose sources are not
    /// ready yet. Startup continues with the values at hand afterwards.
    pub fn with_first_load_timeout(mut self, timeout: Duration) -> Self {
        self.first_load_timeout = timeout;
        self
    }

    /// Register an init callback, run once at startup and on every change.
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn with_init<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.init_callbacks.push((name.into(), Arc::new(callback)));
        self
    }

    /// Customize the log pool (host, clock, opener, sweep intervals).
    ///
    /// Its settings are replaced by the ones read from the configuration.
    pub fn with_pool(mut self, pool: LogPoolBuilder) -> Self {
        self.pool = pool;
        self
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::new()
    }
}
