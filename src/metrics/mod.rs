//! Built-in metrics for the sink pool and the change supervisor.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Sinks opened, reused, evicted and released
//! - Release failures
//! - Active sinks
//! - Configuration change events fanned out to the init registry
//!
//! # Examples
//!
//! ```rust,no_run
//! use hotswap_runtime::metrics::PoolMetrics;
//! use hotswap_runtime::pool::LogPool;
//! use opentelemetry::global;
//!
//! let metrics = PoolMetrics::new(global::meter("my-app"));
//! let pool = LogPool::builder().with_metrics(metrics).build();
//! ```

mod pool_metrics;

pub use pool_metrics::PoolMetrics;
