//! Application bootstrap: wiring, the retry loop and the process-wide slot.

use crate::core::ConfigManager;
use crate::error::{Result, RuntimeError};
use crate::notify::{InitRegistry, Supervisor};
use crate::pool::{LogPool, PoolSettings};
use crate::runtime::{AppOptions, Application};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{MissedTickBehavior, interval_at, timeout};
use tokio_util::sync::CancellationToken;

/// Name of the built-in init callback that re-reads the pool settings.
pub const LOG_SETTINGS_CALLBACK: &str = "log_settings";

/// An explicitly owned runtime context: the application, its init registry
/// and supervisor, and the log pool.
///
/// Most processes use the guarded global through [`init_app`]; tests and
/// embedders can own a `Runtime` directly.
pub struct Runtime {
    app: Arc<Application>,
    pool: LogPool,
    cancel: CancellationToken,
}

impl Runtime {
    /// Build and start a runtime.
    ///
    /// Startup never fails because the configuration is unavailable: the
    /// pool starts with defaults and a retry loop keeps trying every
    /// `reload_interval`. Once loaded, the supervisor is attached and the init
    /// registry is re-run.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NoAsyncRuntime`] outside a tokio runtime.
    pub async fn start(options: AppOptions) -> Result<Arc<Self>> {
        let handle =
            Handle::try_current().map_err(|_| RuntimeError::NoAsyncRuntime("application runtime"))?;

        let AppOptions {
            debug,
            env,
            config_dir,
            config,
            env_prefix,
            file_watch,
            watch_debounce,
            reload_interval,
            first_load_timeout,
            init_callbacks,
            pool,
        } = options;

        let mut manager = ConfigManager::new(config_dir)
            .with_file_watch(file_watch)
            .with_watch_debounce(watch_debounce);
        if let Some(prefix) = env_prefix {
            manager = manager.with_env_prefix(prefix);
        }

        let registry = Arc::new(InitRegistry::new());
        for (name, callback) in init_callbacks {
            registry.register_shared(name, callback);
        }

        #[cfg(feature = "metrics")]
        let (pool, supervisor) = {
            let metrics = crate::metrics::PoolMetrics::new(opentelemetry::global::meter(
                "hotswap-runtime",
            ));
            (
                pool.with_metrics(metrics.clone()),
                Supervisor::new(Arc::clone(&registry)).with_metrics(metrics),
            )
        };
        #[cfg(not(feature = "metrics"))]
        let supervisor = Supervisor::new(Arc::clone(&registry));

        let app = Arc::new(Application::new(
            debug,
            env,
            config,
            manager,
            Arc::new(supervisor),
            handle,
        ));

        let loaded = match app.ensure_config() {
            Ok(config) => {
                if !config.is_loaded() {
                    let mut changes = config.subscribe();
                    if timeout(first_load_timeout, changes.recv()).await.is_err() {
                        tracing::warn!(
                            config = %app.config_name(),
                            ?first_load_timeout,
                            "configuration did not finish loading in time"
                        );
                    }
                }
                true
            }
            Err(e) => {
                tracing::warn!(
                    config = %app.config_name(),
                    error = %e,
                    retry_in = ?reload_interval,
                    "initial configuration load failed"
                );
                false
            }
        };

        // The settings callback is in place before anything can deliver a change.
        let pool = pool.build();
        let weak_app = Arc::downgrade(&app);
        let callback_pool = pool.clone();
        registry.register(LOG_SETTINGS_CALLBACK, move || {
            if let Some(app) = weak_app.upgrade() {
                callback_pool.apply_settings(read_pool_settings(&app));
            }
        });
        pool.apply_settings(read_pool_settings(&app));
        pool.start_sweepers()?;

        registry.invoke_all();
        app.listen();

        let cancel = CancellationToken::new();
        if !loaded {
            tokio::spawn(retry_config_load(
                Arc::downgrade(&app),
                cancel.clone(),
                reload_interval,
            ));
        }

        tracing::info!(
            config = %app.config_name(),
            env = %app.env(),
            debug = app.debug(),
            loaded,
            "application runtime started"
        );

        Ok(Arc::new(Self { app, pool, cancel }))
    }

    /// The application handle.
    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    /// The log pool.
    pub fn pool(&self) -> &LogPool {
        &self.pool
    }

    /// The init registry re-run on every configuration change.
    pub fn registry(&self) -> &Arc<InitRegistry> {
        self.app.supervisor().registry()
    }

    /// The configuration change supervisor.
    pub fn supervisor(&self) -> &Arc<Supervisor> {
        self.app.supervisor()
    }

    /// Register an init callback. It is not run now; it runs on the next change.
    pub fn register_init<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.registry().register(name, callback);
    }

    /// Stop the listener and the retry loop and release every sink.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let _ = self.app.supervisor().stop();
        self.pool.shutdown();
        tracing::debug!("application runtime shut down");
    }
}

fn read_pool_settings(app: &Application) -> PoolSettings {
    PoolSettings::from_lookup(|key, default| app.get_string_config(key, default), app.debug())
}

async fn retry_config_load(app: Weak<Application>, cancel: CancellationToken, period: Duration) {
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempt = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let Some(app) = app.upgrade() else {
            return;
        };

        attempt += 1;
        // A lookup may have loaded it in the meantime.
        if let Err(e) = app.load_and_listen() {
            tracing::warn!(
                config = %app.config_name(),
                attempt,
                error = %e,
                "configuration load retry failed"
            );
            continue;
        }

        tracing::info!(config = %app.config_name(), attempt, "configuration loaded");
        app.supervisor().registry().invoke_all();
        return;
    }
}

static GLOBAL: Mutex<Option<Arc<Runtime>>> = parking_lot::const_mutex(None);

/// Initialize the process-wide runtime. A no-op returning the existing
/// runtime when already initialized.
///
/// # Errors
///
/// Returns [`RuntimeError::NoAsyncRuntime`] outside a tokio runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_runtime::runtime::{AppOptions, init_app};
///
/// # async fn example() -> hotswap_runtime::error::Result<()> {
/// let runtime = init_app(AppOptions::new().with_config_dir("conf")).await?;
/// let level = runtime.app().get_string_config("LOG_ENABLE_LEVEL", "info");
/// runtime.pool().instance("access")?.info(&format!("level {level}"));
/// # Ok(())
/// # }
/// ```
pub async fn init_app(options: AppOptions) -> Result<Arc<Runtime>> {
    if let Some(existing) = global() {
        return Ok(existing);
    }

    let runtime = Runtime::start(options).await?;

    let mut slot = GLOBAL.lock();
    match &*slot {
        Some(existing) => {
            // Lost a concurrent initialization.
            let existing = Arc::clone(existing);
            drop(slot);
            runtime.shutdown();
            Ok(existing)
        }
        None => {
            *slot = Some(Arc::clone(&runtime));
            Ok(runtime)
        }
    }
}

/// The process-wide runtime, if initialized.
pub fn global() -> Option<Arc<Runtime>> {
    GLOBAL.lock().clone()
}

/// Tear down the process-wide runtime so a later [`init_app`] starts fresh.
///
/// Intended for tests and teardown; not safe to race with in-flight
/// lookups from other callers.
pub fn reset() {
    let previous = GLOBAL.lock().take();
    if let Some(runtime) = previous {
        runtime.shutdown();
    }
}
