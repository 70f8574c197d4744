//! Error types for scene composition.

use thiserror::Error;

/// Result type alias for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("building map has no levels")]
    NoLevels,

    #[error("unknown level: {0}")]
    UnknownLevel(String),

    #[error("level {0} has no bounds yet")]
    LevelNotReady(String),

    #[error("failed to load image for level {level}: {reason}")]
    Image { level: String, reason: String },
}
