//! Level transitions for the Stargazer exploration engine.
//!
//! The [`LevelOrchestrator`] moves the session between levels: it dispatches
//! the `LEVEL_TRANSITION_*` action triad, drives the level-loading
//! collaborators, supersedes stale requests by generation, and rolls back
//! to the previous level on failure.
//!
//! # Modules
//!
//! - [`collaborator`] -- [`LevelFactory`], [`LevelHandle`], and
//!   [`CameraPositioner`] contracts.
//! - [`orchestrator`] -- The transition state machine.
//! - [`stub`] -- Scriptable in-process collaborators.
//! - [`error`] -- Transition and collaborator errors.
//!
//! [`LevelOrchestrator`]: orchestrator::LevelOrchestrator
//! [`LevelFactory`]: collaborator::LevelFactory
//! [`LevelHandle`]: collaborator::LevelHandle
//! [`CameraPositioner`]: collaborator::CameraPositioner

pub mod collaborator;
pub mod error;
pub mod orchestrator;
pub mod stub;

pub use collaborator::{CameraPositioner, LevelFactory, LevelHandle};
pub use error::{CameraError, LevelLoadError, TransitionError};
pub use orchestrator::{LevelOrchestrator, TransitionOutcome, TransitionPhase};
pub use stub::{StubCamera, StubEvent, StubLevel, StubLevelFactory};
