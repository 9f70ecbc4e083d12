//! The level transition state machine.
//!
//! ```text
//! Idle -> Requested -> Unloading -> Loading -> Activating -> Idle
//!              \            \           \
//!               +------------+-----------+--> Failed
//! ```
//!
//! At most one transition is in flight. Every request bumps a generation
//! counter; a request whose generation is no longer current when its load
//! finishes is stale, its level is disposed on arrival and nothing is
//! dispatched for it. Outgoing levels are disposed synchronously under the
//! orchestrator lock, so a superseding request never races the disposal of
//! the level it replaces.
//!
//! The snapshot only changes through dispatched `LEVEL_TRANSITION_*`
//! actions. The orchestrator lock is never held across an await or a
//! dispatch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use stargazer_core::Engine;
use stargazer_core::config::LevelsConfig;
use stargazer_types::{
    Action, ActionSource, ErrorComponent, ErrorRecord, ErrorSeverity, LevelId, creators,
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::collaborator::{CameraPositioner, LevelFactory, LevelHandle};
use crate::error::TransitionError;

/// Where the state machine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    /// No transition in flight.
    Idle,
    /// `LEVEL_TRANSITION_START` dispatched.
    Requested,
    /// Disposing the outgoing level.
    Unloading,
    /// Waiting for the incoming level.
    Loading,
    /// Positioning the camera and committing.
    Activating,
    /// The last request failed. New requests are accepted.
    Failed,
}

impl TransitionPhase {
    /// Whether no transition is in flight.
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Idle | Self::Failed)
    }
}

/// How a successful request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The level is now active.
    Completed {
        /// Level left.
        from: LevelId,
        /// Level entered.
        to: LevelId,
        /// Wall time from request to activation.
        duration_ms: u64,
    },
    /// A newer request took over before this one finished.
    Superseded,
    /// The requested level is already active.
    Unchanged,
}

struct Inner<H> {
    phase: TransitionPhase,
    active: Option<H>,
}

/// Drives level changes through the engine.
pub struct LevelOrchestrator<F: LevelFactory, C> {
    engine: Arc<Engine>,
    factory: F,
    camera: C,
    load_timeout: Duration,
    inner: Mutex<Inner<F::Handle>>,
    generation: AtomicU64,
}

impl<F: LevelFactory, C> std::fmt::Debug for LevelOrchestrator<F, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelOrchestrator")
            .field("phase", &self.phase())
            .field("active", &self.active_level())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<F: LevelFactory, C: CameraPositioner> LevelOrchestrator<F, C> {
    /// Create an idle orchestrator with nothing loaded.
    pub fn new(engine: Arc<Engine>, factory: F, camera: C, config: &LevelsConfig) -> Self {
        Self {
            engine,
            factory,
            camera,
            load_timeout: Duration::from_millis(config.load_timeout_ms),
            inner: Mutex::new(Inner {
                phase: TransitionPhase::Idle,
                active: None,
            }),
            generation: AtomicU64::new(0),
        }
    }

    /// Load the snapshot's current level at session start.
    pub async fn activate_initial(&self) -> Result<(), TransitionError> {
        let level = self.engine.state().current_level.clone();
        let generation = {
            let mut inner = self.lock();
            inner.phase = TransitionPhase::Loading;
            self.bump()
        };
        info!(level = %level, "Activating initial level");

        let handle = match self.load(&level).await {
            Ok(handle) => handle,
            Err(error) => {
                if self.is_current(generation) {
                    self.lock().phase = TransitionPhase::Failed;
                }
                error!(level = %level, error = %error, "Initial level failed to load");
                self.emit(report(&error, false));
                return Err(error);
            }
        };
        if self.install(generation, handle, TransitionPhase::Activating) {
            self.position_camera(&level);
            self.settle(generation, TransitionPhase::Idle);
        }
        Ok(())
    }

    /// Transition to `to`.
    ///
    /// Returns [`TransitionOutcome::Superseded`] if a newer request took
    /// over while this one was loading; nothing is dispatched for it after
    /// that point.
    pub async fn request_transition(
        &self,
        to: LevelId,
    ) -> Result<TransitionOutcome, TransitionError> {
        if !self.engine.registry().is_registered(&to) {
            let error = TransitionError::UnknownLevel { level: to };
            warn!(error = %error, "Transition rejected");
            self.emit(report(&error, true));
            return Err(error);
        }

        let started = Instant::now();
        let (generation, from) = {
            let mut inner = self.lock();
            let from = self.engine.state().current_level.clone();
            if inner.phase.is_settled() && from == to {
                debug!(level = %to, "Transition target already active");
                return Ok(TransitionOutcome::Unchanged);
            }
            if !inner.phase.is_settled() {
                info!(to = %to, phase = ?inner.phase, "Superseding in-flight transition");
            }
            inner.phase = TransitionPhase::Requested;
            (self.bump(), from)
        };
        info!(from = %from, to = %to, generation, "Level transition requested");
        self.emit(creators::level_transition_start(from.clone(), to.clone()));

        // Unloading: dispose the outgoing level before anything is loaded.
        let disposal = {
            let mut inner = self.lock();
            if !self.is_current(generation) {
                return Ok(TransitionOutcome::Superseded);
            }
            inner.phase = TransitionPhase::Unloading;
            inner.active.take().map(|mut outgoing| outgoing.dispose())
        };
        if let Some(Err(failure)) = disposal {
            return self.fail(generation, &from, &to, failure.into()).await;
        }

        // Loading.
        if !self.settle(generation, TransitionPhase::Loading) {
            return Ok(TransitionOutcome::Superseded);
        }
        let handle = match self.load(&to).await {
            Ok(handle) => handle,
            Err(error) => return self.fail(generation, &from, &to, error).await,
        };

        // Activating.
        if !self.install(generation, handle, TransitionPhase::Activating) {
            debug!(to = %to, generation, "Stale level load disposed");
            return Ok(TransitionOutcome::Superseded);
        }
        self.position_camera(&to);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.emit(creators::level_transition_success(
            from.clone(),
            to.clone(),
            duration_ms,
        ));
        self.settle(generation, TransitionPhase::Idle);
        info!(from = %from, to = %to, duration_ms, "Level transition completed");
        Ok(TransitionOutcome::Completed {
            from,
            to,
            duration_ms,
        })
    }

    /// Failed branch: report, then reload the level we came from.
    async fn fail(
        &self,
        generation: u64,
        from: &LevelId,
        to: &LevelId,
        error: TransitionError,
    ) -> Result<TransitionOutcome, TransitionError> {
        if !self.settle(generation, TransitionPhase::Failed) {
            debug!(to = %to, error = %error, "Stale level failure ignored");
            return Ok(TransitionOutcome::Superseded);
        }
        warn!(from = %from, to = %to, error = %error, "Level transition failed, rolling back");
        self.emit(creators::level_transition_failure(
            from.clone(),
            to.clone(),
            error.to_string(),
        ));
        self.emit(report(&error, true));

        match self.load(from).await {
            Ok(handle) => {
                if self.install(generation, handle, TransitionPhase::Failed) {
                    self.position_camera(from);
                    info!(level = %from, "Rolled back to previous level");
                }
            }
            Err(rollback) => {
                error!(level = %from, error = %rollback, "Rollback failed");
                self.emit(report(&rollback, false));
            }
        }
        Err(error)
    }

    async fn load(&self, level: &LevelId) -> Result<F::Handle, TransitionError> {
        match tokio::time::timeout(self.load_timeout, self.factory.load(level)).await {
            Ok(Ok(handle)) => Ok(handle),
            Ok(Err(failure)) => Err(failure.into()),
            Err(_elapsed) => Err(TransitionError::Timeout {
                level: level.clone(),
                timeout_ms: u64::try_from(self.load_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Make `handle` the active level and enter `phase` if `generation` is
    /// still current. Otherwise dispose it and return `false`.
    fn install(&self, generation: u64, handle: F::Handle, phase: TransitionPhase) -> bool {
        let stale = {
            let mut inner = self.lock();
            if self.is_current(generation) {
                if let Some(mut previous) = inner.active.replace(handle) {
                    dispose_quietly(&mut previous);
                }
                inner.phase = phase;
                None
            } else {
                Some(handle)
            }
        };
        match stale {
            Some(mut handle) => {
                dispose_quietly(&mut handle);
                false
            }
            None => true,
        }
    }

    fn position_camera(&self, level: &LevelId) {
        if let Err(failure) = self.camera.apply_level_defaults(level) {
            warn!(level = %level, error = %failure, "Camera positioning failed");
            let record =
                ErrorRecord::new(ErrorComponent::LevelOrchestrator, failure.to_string(), true)
                    .with_severity(ErrorSeverity::Low);
            self.emit(creators::error_occurred(record, ActionSource::Orchestrator));
        }
    }

    /// Enter `phase` if `generation` is still current.
    fn settle(&self, generation: u64, phase: TransitionPhase) -> bool {
        let mut inner = self.lock();
        if self.is_current(generation) {
            inner.phase = phase;
            true
        } else {
            false
        }
    }

    fn bump(&self) -> u64 {
        self.generation
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn emit(&self, action: Action) {
        if let Err(failure) = self.engine.dispatch(action) {
            warn!(error = %failure, "Orchestrator action could not be dispatched");
        }
    }
}

impl<F: LevelFactory, C> LevelOrchestrator<F, C> {
    /// Current phase.
    pub fn phase(&self) -> TransitionPhase {
        self.lock().phase
    }

    /// Level whose handle is currently held, if any.
    pub fn active_level(&self) -> Option<LevelId> {
        self.lock()
            .active
            .as_ref()
            .map(|handle| handle.level_id().clone())
    }

    /// The level factory.
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    /// The camera positioner.
    pub const fn camera(&self) -> &C {
        &self.camera
    }

    fn lock(&self) -> MutexGuard<'_, Inner<F::Handle>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn dispose_quietly(handle: &mut impl LevelHandle) {
    if let Err(failure) = handle.dispose() {
        warn!(level = %handle.level_id(), error = %failure, "Level disposal failed");
    }
}

fn report(error: &TransitionError, recoverable: bool) -> Action {
    let record = ErrorRecord::new(
        ErrorComponent::LevelOrchestrator,
        error.to_string(),
        recoverable,
    );
    creators::error_occurred(record, ActionSource::Orchestrator)
}
