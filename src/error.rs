//! Error types for hotswap-runtime.

use std::path::PathBuf;

/// Result type alias for hotswap-runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while loading configuration or managing log sinks.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Failed to load configuration from a source.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// Failed to parse a configuration source or value.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// File watching failed to initialize.
    #[error("File watching error: {0}")]
    WatchError(String),

    /// The requested configuration key has no value.
    #[error("Configuration key not found: {0}")]
    KeyNotFound(String),

    /// A sink key cannot be used as a path segment.
    #[error("Invalid sink key: {0:?}")]
    InvalidKey(String),

    /// The rotation directory or backing file could not be created or opened.
    #[error("Failed to create log sink at {}: {source}", path.display())]
    SinkCreation {
        /// Path that could not be created
        path: PathBuf,
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// A background task was requested outside of a tokio runtime.
    #[error("No tokio runtime available to spawn {0}")]
    NoAsyncRuntime(&'static str),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("Runtime error: {0}")]
    Other(String),
}

impl RuntimeError {
    /// Wrap a filesystem error raised while preparing `path`.
    pub(crate) fn sink_creation(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SinkCreation {
            path: path.into(),
            source,
        }
    }
}
