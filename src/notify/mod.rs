//! Configuration change notification.
//!
//! [`Supervisor`] listens to a configuration's change events and re-runs the
//! [`InitRegistry`]; [`ConfigWatcher`] turns file edits into reloads.

pub mod registry;
pub mod supervisor;
#[cfg(feature = "file-watch")]
pub mod watcher;

pub use registry::{InitCallback, InitRegistry};
pub use supervisor::{Supervisor, SupervisorState};
#[cfg(feature = "file-watch")]
pub use watcher::ConfigWatcher;
