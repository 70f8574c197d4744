//! Error types for resource lookups.

use thiserror::Error;

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to read manifest {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error("icon lookup failed for {key}: {reason}")]
    Lookup { key: String, reason: String },
}
