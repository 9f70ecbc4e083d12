//! Contracts for the rendering-side collaborators the orchestrator drives.
//!
//! The orchestrator never builds scenes itself. It asks a [`LevelFactory`]
//! for a [`LevelHandle`], disposes handles it no longer needs, and asks a
//! [`CameraPositioner`] to apply a level's default view.

use std::future::Future;

use stargazer_types::LevelId;

use crate::error::{CameraError, LevelLoadError};

/// A loaded level's resources.
pub trait LevelHandle: Send {
    /// The level this handle belongs to.
    fn level_id(&self) -> &LevelId;

    /// Release the level's resources. Called at most once per handle.
    fn dispose(&mut self) -> Result<(), LevelLoadError>;
}

/// Builds levels. Loading may suspend and may fail.
pub trait LevelFactory: Send + Sync {
    /// Handle type produced by [`load`](Self::load).
    type Handle: LevelHandle + 'static;

    /// Construct and initialize `level`.
    fn load(
        &self,
        level: &LevelId,
    ) -> impl Future<Output = Result<Self::Handle, LevelLoadError>> + Send;
}

/// Moves the camera and player to a level's defaults.
pub trait CameraPositioner: Send + Sync {
    /// Apply `level`'s default camera placement.
    fn apply_level_defaults(&self, level: &LevelId) -> Result<(), CameraError>;
}
