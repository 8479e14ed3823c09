//! The application handle: configuration access with lazy loading.

use crate::core::{ConfigManager, Configer};
use crate::error::Result;
use crate::notify::Supervisor;
use crate::runtime::ConfigParams;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Process configuration plus the supervisor listening to it.
///
/// The configuration is loaded at most once. Until it is, every
/// [`get_string_config`](Self::get_string_config) call attempts the load
/// again and falls back to the caller's default.
pub struct Application {
    debug: bool,
    env: String,
    params: ConfigParams,
    manager: ConfigManager,
    config: RwLock<Option<Arc<dyn Configer>>>,
    load_lock: Mutex<()>,
    supervisor: Arc<Supervisor>,
    handle: Handle,
}

impl Application {
    pub(crate) fn new(
        debug: bool,
        env: String,
        params: ConfigParams,
        manager: ConfigManager,
        supervisor: Arc<Supervisor>,
        handle: Handle,
    ) -> Self {
        Self {
            debug,
            env,
            params,
            manager,
            config: RwLock::new(None),
            load_lock: Mutex::new(()),
            supervisor,
            handle,
        }
    }

    /// Whether the debug level is forced.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Deployment environment name.
    pub fn env(&self) -> &str {
        &self.env
    }

    /// Name of the configuration instance.
    pub fn config_name(&self) -> &str {
        &self.params.name
    }

    /// Directory local configurations are resolved in.
    pub fn config_dir(&self) -> &Path {
        self.manager.config_dir()
    }

    /// The loaded configuration, if any.
    pub fn config(&self) -> Option<Arc<dyn Configer>> {
        self.config.read().clone()
    }

    pub(crate) fn manager(&self) -> &ConfigManager {
        &self.manager
    }

    pub(crate) fn params(&self) -> &ConfigParams {
        &self.params
    }

    /// The supervisor re-running init callbacks on configuration changes.
    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Look up `key`, loading the configuration first if needed.
    ///
    /// Returns `default` when no configuration is loaded or the value is
    /// missing or empty.
    pub fn get_string_config(&self, key: &str, default: &str) -> String {
        let config = match self.config() {
            Some(config) => config,
            None => match self.load_and_listen() {
                Ok(config) => config,
                Err(_) => return default.to_string(),
            },
        };
        config.get_string_or(key, default)
    }

    /// Load the configuration if it is not loaded yet, without attaching the
    /// supervisor.
    ///
    /// # Errors
    ///
    /// Returns the load error; nothing is stored in that case.
    pub(crate) fn ensure_config(&self) -> Result<Arc<dyn Configer>> {
        let _loading = self.load_lock.lock();
        if let Some(config) = self.config() {
            return Ok(config);
        }

        // File watchers spawn on the runtime the application was started on.
        let _entered = self.handle.enter();
        let config: Arc<dyn Configer> = self
            .manager
            .instance(&self.params.name, self.params.parse_type, &self.params.source)
            .inspect_err(|e| {
                tracing::debug!(config = %self.params.name, error = %e, "configuration not loaded");
            })?;

        *self.config.write() = Some(Arc::clone(&config));
        Ok(config)
    }

    /// Attach the supervisor to the loaded configuration. No-op when none is
    /// loaded or a listener is already running.
    pub(crate) fn listen(&self) {
        let Some(config) = self.config() else {
            return;
        };
        let _entered = self.handle.enter();
        if let Err(e) = self.supervisor.attach(config.as_ref()) {
            tracing::warn!(error = %e, "could not attach configuration listener");
        }
    }

    pub(crate) fn load_and_listen(&self) -> Result<Arc<dyn Configer>> {
        let config = self.ensure_config()?;
        self.listen();
        Ok(config)
    }
}
