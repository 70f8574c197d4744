//! Error types for trajectory fetching.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for trajectory operations.
pub type TrajectoryResult<T> = Result<T, TrajectoryError>;

#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("trajectory service error: {0}")]
    Service(String),

    #[error("trajectory request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to load replay data from {path}: {reason}")]
    Replay { path: String, reason: String },
}
