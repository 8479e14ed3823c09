//! # hotswap-runtime
//!
//! Application bootstrap runtime: hot-reloadable configuration driving a pool
//! of time-rotated log sinks.
//!
//! ## Overview
//!
//! `hotswap-runtime` wires together:
//! - Lock-free configuration lookups using `arc-swap`, reloaded on file change
//! - A single change listener that re-runs named init callbacks on every reload
//! - A pool of log sinks keyed by name, rotated daily or hourly into
//!   `{log_dir}/{YYYYMMDD|YYYYMMDDThh}/{host}/{key}.log`
//! - Background sweepers that release rotated sinks off the lookup path
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hotswap_runtime::prelude::*;
//!
//! # async fn example() -> hotswap_runtime::error::Result<()> {
//! // Reads conf/app.toml; starts with defaults if it is missing
//! let runtime = init_app(
//!     AppOptions::new()
//!         .with_config_dir("conf")
//!         .with_init("cache", || println!("configuration changed")),
//! )
//! .await?;
//!
//! let log = runtime.pool().instance("access")?;
//! log.event(Level::INFO).field("status", 200).msg("request served");
//!
//! let dir = runtime.app().get_string_config("LOG_DIR", "/data/logs");
//! println!("logging under {dir}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration keys
//!
//! | Key                | Values                        | Default      |
//! |--------------------|-------------------------------|--------------|
//! | `LOG_DIR`          | directory                     | `/data/logs` |
//! | `LOG_ENABLE_LEVEL` | `debug`, `info`, `warn`, `error` | `info`    |
//! | `LOG_TIME_GROUP`   | `daily`, `hour`               | `daily`      |
//! | `LOG_SINK_TYPE`    | `file`, `console`             | `file`       |
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): reload local configuration files on change
//! - `metrics`: OpenTelemetry metrics for the pool and the supervisor

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod pool;
pub mod runtime;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{Configer, ConfigManager, ReloadableConfig, SourceKind};
    pub use crate::error::{Result, RuntimeError};
    pub use crate::notify::{InitRegistry, Supervisor};
    pub use crate::pool::{LogPool, Logger, PoolSettings, Rotation, SinkType};
    pub use crate::runtime::{AppOptions, Application, Runtime, global, init_app, reset};
    pub use crate::sources::ParseType;
    pub use tracing::Level;
}
