//! Error types for fleetscope core.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while loading configuration, settings, or static data.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),
}
