//! Sink pool metrics tracking using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Meter};

/// Metrics collector for pool and supervisor activity.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_runtime::metrics::PoolMetrics;
/// use opentelemetry::global;
///
/// let metrics = PoolMetrics::new(global::meter("hotswap-runtime"));
/// metrics.record_sink_opened(1);
/// metrics.record_sink_evicted("rotated");
/// ```
#[derive(Clone)]
pub struct PoolMetrics {
    sinks_opened: Counter<u64>,
    sinks_reused: Counter<u64>,
    sinks_evicted: Counter<u64>,
    sinks_released: Counter<u64>,
    release_failures: Counter<u64>,
    active_sinks: Gauge<i64>,
    change_events: Counter<u64>,
}

impl PoolMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let sinks_opened = meter
            .u64_counter("hotswap_runtime.sinks.opened")
            .with_description("Number of sinks opened")
            .build();

        let sinks_reused = meter
            .u64_counter("hotswap_runtime.sinks.reused")
            .with_description("Number of lookups served by a cached sink")
            .build();

        let sinks_evicted = meter
            .u64_counter("hotswap_runtime.sinks.evicted")
            .with_description("Number of sinks queued for release")
            .build();

        let sinks_released = meter
            .u64_counter("hotswap_runtime.sinks.released")
            .with_description("Number of sinks released by the sweeper")
            .build();

        let release_failures = meter
            .u64_counter("hotswap_runtime.sinks.release_failures")
            .with_description("Number of sink releases that failed to flush")
            .build();

        let active_sinks = meter
            .i64_gauge("hotswap_runtime.sinks.active")
            .with_description("Number of active sinks")
            .build();

        let change_events = meter
            .u64_counter("hotswap_runtime.config.changes")
            .with_description("Number of configuration change events dispatched")
            .build();

        Self {
            sinks_opened,
            sinks_reused,
            sinks_evicted,
            sinks_released,
            release_failures,
            active_sinks,
            change_events,
        }
    }

    /// Record a newly opened sink and the resulting active count.
    pub fn record_sink_opened(&self, active: usize) {
        self.sinks_opened.add(1, &[]);
        self.update_active_sinks(active);
    }

    /// Record a lookup served from the cache.
    pub fn record_sink_reused(&self) {
        self.sinks_reused.add(1, &[]);
    }

    /// Record an eviction, tagged with its reason (`rotated`, `expired`, `missing`).
    pub fn record_sink_evicted(&self, reason: &'static str) {
        self.sinks_evicted.add(1, &[KeyValue::new("reason", reason)]);
    }

    /// Record `count` released sinks.
    pub fn record_sinks_released(&self, count: usize) {
        if count > 0 {
            self.sinks_released.add(count as u64, &[]);
        }
    }

    /// Record a release that failed to flush.
    pub fn record_release_failure(&self) {
        self.release_failures.add(1, &[]);
    }

    /// Update the active sink gauge.
    pub fn update_active_sinks(&self, active: usize) {
        self.active_sinks.record(active as i64, &[]);
    }

    /// Record a change event dispatched to the init registry.
    pub fn record_change_event(&self) {
        self.change_events.add(1, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::global;

    #[test]
    fn test_metrics_creation() {
        let metrics = PoolMetrics::new(global::meter("test"));

        // Recording against the no-op global meter must not panic
        metrics.record_sink_opened(1);
        metrics.record_sink_reused();
        metrics.record_sink_evicted("rotated");
        metrics.record_sinks_released(0);
        metrics.record_sinks_released(2);
        metrics.record_release_failure();
        metrics.update_active_sinks(0);
        metrics.record_change_event();
    }

    #[test]
    fn test_metrics_clone() {
        let metrics = PoolMetrics::new(global::meter("test"));
        let metrics2 = metrics.clone();

        metrics.record_sink_opened(1);
        metrics2.record_sink_opened(2);
    }
}
