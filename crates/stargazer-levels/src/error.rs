//! Error types for level loading and transitions.

use stargazer_types::LevelId;

/// Failure reported by a [`LevelFactory`](crate::collaborator::LevelFactory)
/// or a [`LevelHandle`](crate::collaborator::LevelHandle).
#[derive(Debug, thiserror::Error)]
pub enum LevelLoadError {
    /// Building the level failed.
    #[error("failed to load level {level}: {reason}")]
    Load {
        /// Level being loaded.
        level: LevelId,
        /// What went wrong.
        reason: String,
    },

    /// Releasing the level's resources failed.
    #[error("failed to dispose level {level}: {reason}")]
    Dispose {
        /// Level being disposed.
        level: LevelId,
        /// What went wrong.
        reason: String,
    },
}

/// Failure reported by a [`CameraPositioner`](crate::collaborator::CameraPositioner).
#[derive(Debug, thiserror::Error)]
#[error("failed to position camera for level {level}: {reason}")]
pub struct CameraError {
    /// Level whose defaults were being applied.
    pub level: LevelId,
    /// What went wrong.
    pub reason: String,
}

/// Why a transition request did not complete.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    /// The target is not a registered level.
    #[error("unknown level: {level}")]
    UnknownLevel {
        /// The requested level.
        level: LevelId,
    },

    /// The collaborator failed to unload or load a level.
    #[error(transparent)]
    Level(#[from] LevelLoadError),

    /// The load did not finish within the configured timeout.
    #[error("loading level {level} timed out after {timeout_ms} ms")]
    Timeout {
        /// Level being loaded.
        level: LevelId,
        /// Configured timeout.
        timeout_ms: u64,
    },
}
