//! Pool-wide settings driven by configuration.

use crate::pool::Rotation;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Configuration key of the log directory.
pub const LOG_DIR: &str = "LOG_DIR";
/// Configuration key of the minimum level (`debug|info|warn|error`).
pub const LOG_ENABLE_LEVEL: &str = "LOG_ENABLE_LEVEL";
/// Configuration key of the rotation granularity (`daily|hour`).
pub const LOG_TIME_GROUP: &str = "LOG_TIME_GROUP";
/// Configuration key of the sink type (`file|console`).
pub const LOG_SINK_TYPE: &str = "LOG_SINK_TYPE";

/// Default log directory.
pub const DEFAULT_LOG_DIR: &str = "/data/logs";

/// Kind of destination sinks write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SinkType {
    /// A file under the rotation directory.
    #[default]
    File,
    /// Standard output.
    Console,
}

impl SinkType {
    /// Parse the `LOG_SINK_TYPE` setting. Anything but `console` is a file sink.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("console") {
            Self::Console
        } else {
            Self::File
        }
    }
}

/// Parse the `LOG_ENABLE_LEVEL` setting. Unknown values fall back to `info`.
pub fn parse_level(value: &str) -> LevelFilter {
    match value.trim().to_ascii_lowercase().as_str() {
        "debug" => LevelFilter::DEBUG,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

/// Settings shared by every sink of a pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    /// Root of the rotation directories.
    pub log_dir: PathBuf,
    /// Configured minimum level.
    pub level: LevelFilter,
    /// Rotation granularity.
    pub rotation: Rotation,
    /// Destination kind.
    pub sink_type: SinkType,
    /// Forces `debug` regardless of `level`.
    pub debug: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            level: LevelFilter::INFO,
            rotation: Rotation::Daily,
            sink_type: SinkType::File,
            debug: false,
        }
    }
}

impl PoolSettings {
    /// Build settings from a `(key, default) -> value` lookup.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hotswap_runtime::pool::{PoolSettings, Rotation};
    ///
    /// let settings = PoolSettings::from_lookup(
    ///     |key, default| match key {
    ///         "LOG_TIME_GROUP" => "hour".to_string(),
    ///         _ => default.to_string(),
    ///     },
    ///     false,
    /// );
    /// assert_eq!(settings.rotation, Rotation::Hourly);
    /// ```
    pub fn from_lookup<F>(lookup: F, debug: bool) -> Self
    where
        F: Fn(&str, &str) -> String,
    {
        Self {
            log_dir: PathBuf::from(lookup(LOG_DIR, DEFAULT_LOG_DIR)),
            level: parse_level(&lookup(LOG_ENABLE_LEVEL, "info")),
            rotation: Rotation::parse(&lookup(LOG_TIME_GROUP, "daily")),
            sink_type: SinkType::parse(&lookup(LOG_SINK_TYPE, "file")),
            debug,
        }
    }

    /// Level handles actually filter at.
    pub fn effective_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::DEBUG
        } else {
            self.level
        }
    }

    /// Set the log directory.
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Set the rotation granularity.
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the configured level.
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Set the sink type.
    pub fn with_sink_type(mut self, sink_type: SinkType) -> Self {
        self.sink_type = sink_type;
        self
    }
}
