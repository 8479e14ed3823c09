//! Core configuration types.

mod builder;
mod config_handle;
mod configer;
mod loader;
mod manager;

pub use builder::ReloadableConfigBuilder;
pub use config_handle::ReloadableConfig;
pub use configer::{ChangeEvent, Configer};
pub use loader::ConfigLoader;
pub use manager::{ConfigManager, SourceKind};
