//! The log sink pool: lazy creation, rotation on lookup, deferred release.

use crate::error::{Result, RuntimeError};
use crate::pool::{
    Clock, Logger, PoolSettings, SinkOpener, SinkRelease, SinkTarget, SinkType, StandardOpener,
    SystemClock, build_log_path, local_hostname,
};
use super::path::is_valid_key;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::time::{MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;

#[cfg(feature = "metrics")]
use crate::metrics::PoolMetrics;

/// Default period of the release sweeper.
pub const DEFAULT_RELEASE_INTERVAL: Duration = Duration::from_secs(10);
/// Default period of the staleness sweeper.
pub const DEFAULT_STALE_INTERVAL: Duration = Duration::from_secs(120);

/// Why an entry left the active map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictReason {
    /// Lookup resolved a different target (new bucket or new settings).
    Rotated,
    /// Idle past the rotation TTL.
    Expired,
    /// The backing file disappeared.
    Missing,
    /// The pool shut down.
    Shutdown,
}

impl EvictReason {
    /// Stable lower-case name, used in logs and metric attributes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rotated => "rotated",
            Self::Expired => "expired",
            Self::Missing => "missing",
            Self::Shutdown => "shutdown",
        }
    }
}

/// One active destination.
struct SinkEntry {
    logger: Logger,
    release: SinkRelease,
    target: SinkTarget,
    registered_at: Instant,
}

/// A destination out of service, waiting for the release sweeper.
struct PendingRelease {
    key: String,
    target: SinkTarget,
    release: SinkRelease,
    enqueued_at: Instant,
    reason: EvictReason,
}

#[derive(Default)]
struct PoolState {
    active: HashMap<String, SinkEntry>,
    pending: Vec<PendingRelease>,
}

impl PoolState {
    fn evict(&mut self, key: &str, reason: EvictReason, now: Instant) -> bool {
        match self.active.remove(key) {
            Some(entry) => {
                tracing::debug!(
                    key,
                    target = ?entry.target,
                    reason = reason.as_str(),
                    "sink queued for release"
                );
                self.pending.push(PendingRelease {
                    key: key.to_string(),
                    target: entry.target,
                    release: entry.release,
                    enqueued_at: now,
                    reason,
                });
                true
            }
            None => false,
        }
    }
}

/// Counts describing a pool at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Entries currently served by `instance`.
    pub active: usize,
    /// Entries waiting for the release sweeper.
    pub pending: usize,
    /// Releases performed over the pool's lifetime.
    pub released: u64,
}

struct PoolInner {
    state: Mutex<PoolState>,
    settings: ArcSwap<PoolSettings>,
    level: Arc<ArcSwap<LevelFilter>>,
    opener: Arc<dyn SinkOpener>,
    clock: Arc<dyn Clock>,
    host: String,
    release_interval: Duration,
    stale_interval: Duration,
    released: AtomicU64,
    sweepers_started: AtomicBool,
    cancel: CancellationToken,
    #[cfg(feature = "metrics")]
    metrics: Option<PoolMetrics>,
}

/// Cache of named log sinks with time-bucketed rotation.
///
/// [`instance`](Self::instance) returns the cached handle for a key while its
/// rotation bucket is current and its file exists; otherwise the old entry is
/// queued for release and a new sink is opened. All map mutations happen
/// under a single mutex, so two concurrent lookups of one key never open two
/// files.
///
/// Releasing happens only in [`sweep_pending`](Self::sweep_pending), which the
/// release sweeper runs periodically off the lookup path.
/// [`sweep_stale`](Self::sweep_stale) evicts entries idle past the rotation
/// TTL or whose file was deleted.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_runtime::pool::{LogPool, PoolSettings};
///
/// # async fn example() -> hotswap_runtime::error::Result<()> {
/// let pool = LogPool::builder()
///     .with_settings(PoolSettings::default().with_log_dir("/var/log/svc"))
///     .build();
/// pool.start_sweepers()?;
///
/// let log = pool.instance("access")?;
/// log.info("listening");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LogPool {
    inner: Arc<PoolInner>,
}

impl LogPool {
    /// Create a new pool builder.
    pub fn builder() -> LogPoolBuilder {
        LogPoolBuilder::new()
    }

    /// Get the sink for `key`, opening or rotating it as needed.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidKey`] for an empty key or one with a
    /// `..` segment, and
    /// [`RuntimeError::SinkCreation`] when the rotation directory or file
    /// cannot be created. A failed call leaves no active entry for `key`.
    pub fn instance(&self, key: &str) -> Result<Logger> {
        if !is_valid_key(key) {
            return Err(RuntimeError::InvalidKey(key.to_string()));
        }

        let inner = &self.inner;
        let target = inner.resolve_target(key);
        let now = inner.clock.monotonic();

        let mut state = inner.state.lock();

        let mut stale_reason = None;
        if let Some(entry) = state.active.get_mut(key) {
            if entry.target == target && entry.target.is_present() {
                entry.registered_at = now;
                inner.record_reused();
                return Ok(entry.logger.clone());
            }
            stale_reason = Some(if entry.target == target {
                EvictReason::Missing
            } else {
                EvictReason::Rotated
            });
        }
        if let Some(reason) = stale_reason {
            state.evict(key, reason, now);
            inner.record_evicted(reason);
        }

        let opened = inner.opener.open(&target)?;
        let logger = Logger::new(
            key,
            &inner.host,
            target.clone(),
            opened.writer,
            Arc::clone(&inner.level),
        );

        state.active.insert(
            key.to_string(),
            SinkEntry {
                logger: logger.clone(),
                release: opened.release,
                target,
                registered_at: now,
            },
        );
        inner.record_opened(state.active.len());

        tracing::debug!(key, target = ?logger.target(), "sink opened");
        Ok(logger)
    }

    /// Release every pending entry. Returns how many were released.
    ///
    /// Entries are taken out under the lock and closed after it is dropped.
    pub fn sweep_pending(&self) -> usize {
        self.inner.sweep_pending()
    }

    /// Queue entries idle past the TTL or whose file is gone. Returns how many
    /// were queued.
    pub fn sweep_stale(&self) -> usize {
        self.inner.sweep_stale()
    }

    /// Spawn the release and staleness sweepers on the current tokio runtime.
    ///
    /// Calling it again is a no-op. The sweepers stop on
    /// [`shutdown`](Self::shutdown) or when the last pool handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NoAsyncRuntime`] outside a tokio runtime.
    pub fn start_sweepers(&self) -> Result<()> {
        let handle =
            Handle::try_current().map_err(|_| RuntimeError::NoAsyncRuntime("pool sweepers"))?;

        if self.inner.sweepers_started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let release_interval = self.inner.release_interval;
        let stale_interval = self.inner.stale_interval;
        handle.spawn(run_sweeper(
            Arc::downgrade(&self.inner),
            self.inner.cancel.clone(),
            release_interval,
            PoolInner::sweep_pending,
        ));
        handle.spawn(run_sweeper(
            Arc::downgrade(&self.inner),
            self.inner.cancel.clone(),
            stale_interval,
            PoolInner::sweep_stale,
        ));

        tracing::debug!(?release_interval, ?stale_interval, "pool sweepers started");
        Ok(())
    }

    /// Stop the sweepers and release every sink, active or pending.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.drain_all();
    }

    /// Replace the pool-wide settings.
    ///
    /// The level applies to live handles at once; directory, rotation and
    /// sink type apply from the next `instance` call of each key.
    pub fn apply_settings(&self, settings: PoolSettings) {
        self.inner
            .level
            .store(Arc::new(settings.effective_level()));
        tracing::debug!(?settings, "pool settings applied");
        self.inner.settings.store(Arc::new(settings));
    }

    /// Current settings.
    pub fn settings(&self) -> Arc<PoolSettings> {
        self.inner.settings.load_full()
    }

    /// Host segment used in paths and records.
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Target of the active entry for `key`, if any.
    pub fn active_target(&self, key: &str) -> Option<SinkTarget> {
        self.inner
            .state
            .lock()
            .active
            .get(key)
            .map(|entry| entry.target.clone())
    }

    /// Targets waiting for release, with the key and reason they were evicted for.
    pub fn pending(&self) -> Vec<(String, SinkTarget, EvictReason)> {
        self.inner
            .state
            .lock()
            .pending
            .iter()
            .map(|p| (p.key.clone(), p.target.clone(), p.reason))
            .collect()
    }

    /// Current counts.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            active: state.active.len(),
            pending: state.pending.len(),
            released: self.inner.released.load(Ordering::Relaxed),
        }
    }
}

impl PoolInner {
    fn resolve_target(&self, key: &str) -> SinkTarget {
        let settings = self.settings.load();
        let now = self.clock.now();
        match settings.sink_type {
            SinkType::File => SinkTarget::File(build_log_path(
                &settings.log_dir,
                &now,
                settings.rotation,
                &self.host,
                key,
            )),
            SinkType::Console => SinkTarget::Console {
                bucket: settings.rotation.bucket(&now),
            },
        }
    }

    fn sweep_pending(&self) -> usize {
        let drained = std::mem::take(&mut self.state.lock().pending);
        let count = drained.len();
        let now = self.clock.monotonic();

        for pending in drained {
            let waited = now.saturating_duration_since(pending.enqueued_at);
            match pending.release.release() {
                Ok(()) => tracing::debug!(
                    key = %pending.key,
                    target = ?pending.target,
                    ?waited,
                    "sink released"
                ),
                Err(e) => {
                    self.record_release_failure();
                    tracing::warn!(
                        key = %pending.key,
                        target = ?pending.target,
                        error = %e,
                        "sink release failed"
                    );
                }
            }
        }

        self.released.fetch_add(count as u64, Ordering::Relaxed);
        self.record_released(count);
        count
    }

    fn sweep_stale(&self) -> usize {
        let ttl = self.settings.load().rotation.ttl();
        let now = self.clock.monotonic();
        let mut state = self.state.lock();

        let stale: Vec<(String, EvictReason)> = state
            .active
            .iter()
            .filter_map(|(key, entry)| {
                if now.saturating_duration_since(entry.registered_at) > ttl {
                    Some((key.clone(), EvictReason::Expired))
                } else if !entry.target.is_present() {
                    Some((key.clone(), EvictReason::Missing))
                } else {
                    None
                }
            })
            .collect();

        for (key, reason) in &stale {
            state.evict(key, *reason, now);
            self.record_evicted(*reason);
        }
        self.record_active(state.active.len());
        stale.len()
    }

    fn drain_all(&self) {
        {
            let mut state = self.state.lock();
            let now = self.clock.monotonic();
            let keys: Vec<String> = state.active.keys().cloned().collect();
            for key in keys {
                state.evict(&key, EvictReason::Shutdown, now);
            }
            self.record_active(0);
        }
        self.sweep_pending();
    }
}

#[cfg(feature = "metrics")]
impl PoolInner {
    fn record_opened(&self, active: usize) {
        if let Some(m) = &self.metrics {
            m.record_sink_opened(active);
        }
    }

    fn record_reused(&self) {
        if let Some(m) = &self.metrics {
            m.record_sink_reused();
        }
    }

    fn record_evicted(&self, reason: EvictReason) {
        if let Some(m) = &self.metrics {
            m.record_sink_evicted(reason.as_str());
        }
    }

    fn record_released(&self, count: usize) {
        if let Some(m) = &self.metrics {
            m.record_sinks_released(count);
        }
    }

    fn record_release_failure(&self) {
        if let Some(m) = &self.metrics {
            m.record_release_failure();
        }
    }

    fn record_active(&self, active: usize) {
        if let Some(m) = &self.metrics {
            m.update_active_sinks(active);
        }
    }
}

#[cfg(not(feature = "metrics"))]
impl PoolInner {
    fn record_opened(&self, _active: usize) {}
    fn record_reused(&self) {}
    fn record_evicted(&self, _reason: EvictReason) {}
    fn record_released(&self, _count: usize) {}
    fn record_release_failure(&self) {}
    fn record_active(&self, _active: usize) {}
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.drain_all();
    }
}

async fn run_sweeper(
    pool: Weak<PoolInner>,
    cancel: CancellationToken,
    period: Duration,
    sweep: fn(&PoolInner) -> usize,
) {
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(pool) = pool.upgrade() else {
                    break;
                };
                let swept = sweep(&pool);
                if swept > 0 {
                    tracing::debug!(swept, "pool sweep");
                }
            }
        }
    }
}

/// Builder for a [`LogPool`].
pub struct LogPoolBuilder {
    settings: PoolSettings,
    opener: Arc<dyn SinkOpener>,
    clock: Arc<dyn Clock>,
    host: Option<String>,
    release_interval: Duration,
    stale_interval: Duration,
    #[cfg(feature = "metrics")]
    metrics: Option<PoolMetrics>,
}

impl LogPoolBuilder {
    /// Create a builder with default settings, the standard opener and the system clock.
    pub fn new() -> Self {
        Self {
            settings: PoolSettings::default(),
            opener: Arc::new(StandardOpener),
            clock: Arc::new(SystemClock),
            host: None,
            release_interval: DEFAULT_RELEASE_INTERVAL,
            stale_interval: DEFAULT_STALE_INTERVAL,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Initial settings.
    pub fn with_settings(mut self, settings: PoolSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Custom sink opener.
    pub fn with_opener<O: SinkOpener + 'static>(mut self, opener: O) -> Self {
        self.opener = Arc::new(opener);
        self
    }

    /// Custom clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Host segment; defaults to [`local_hostname`]. Empty omits the segment.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Period of the release sweeper.
    pub fn with_release_interval(mut self, interval: Duration) -> Self {
        self.release_interval = interval;
        self
    }

    /// Period of the staleness sweeper.
    pub fn with_stale_interval(mut self, interval: Duration) -> Self {
        self.stale_interval = interval;
        self
    }

    /// Record pool activity in `metrics`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: PoolMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the pool. Sweepers are started separately with
    /// [`LogPool::start_sweepers`].
    pub fn build(self) -> LogPool {
        let level = Arc::new(ArcSwap::from_pointee(self.settings.effective_level()));
        LogPool {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState::default()),
                settings: ArcSwap::from_pointee(self.settings),
                level,
                opener: self.opener,
                clock: self.clock,
                host: self.host.unwrap_or_else(local_hostname),
                release_interval: self.release_interval,
                stale_interval: self.stale_interval,
                released: AtomicU64::new(0),
                sweepers_started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                #[cfg(feature = "metrics")]
                metrics: self.metrics,
            }),
        }
    }
}

impl Default for LogPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
