//! Application bootstrap.
//!
//! [`Runtime::start`] loads the configuration, attaches the change
//! [`Supervisor`](crate::notify::Supervisor), builds the
//! [`LogPool`](crate::pool::LogPool) from the configured tunables and runs the
//! init callbacks once. [`init_app`] keeps a single runtime per process;
//! [`reset`] tears it down again.

mod application;
mod bootstrap;
mod options;

pub use application::Application;
pub use bootstrap::{LOG_SETTINGS_CALLBACK, Runtime, global, init_app, reset};
pub use options::{AppOptions, ConfigParams, DEFAULT_FIRST_LOAD_TIMEOUT, DEFAULT_RELOAD_INTERVAL};
