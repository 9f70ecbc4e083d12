//! In-process collaborators for tests and headless sessions.
//!
//! [`StubLevelFactory`] "loads" a level by sleeping for a configurable
//! delay and records every load and disposal. Levels can be scripted to
//! fail. [`StubCamera`] records which level defaults were applied.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use stargazer_types::LevelId;
use tracing::debug;

use crate::collaborator::{CameraPositioner, LevelFactory, LevelHandle};
use crate::error::{CameraError, LevelLoadError};

/// A recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubEvent {
    /// A load completed successfully.
    Loaded(LevelId),
    /// A handle was disposed.
    Disposed(LevelId),
}

type EventLog = Arc<Mutex<Vec<StubEvent>>>;

fn record(log: &EventLog, event: StubEvent) {
    log.lock().unwrap_or_else(PoisonError::into_inner).push(event);
}

/// Level factory with scripted delays and failures.
#[derive(Debug, Default)]
pub struct StubLevelFactory {
    delays: Mutex<BTreeMap<LevelId, Duration>>,
    failing_loads: Mutex<BTreeSet<LevelId>>,
    failing_disposals: Arc<Mutex<BTreeSet<LevelId>>>,
    log: EventLog,
}

impl StubLevelFactory {
    /// A factory whose loads succeed immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make loads of `level` take `delay`.
    #[must_use]
    pub fn with_delay(self, level: impl Into<LevelId>, delay: Duration) -> Self {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(level.into(), delay);
        self
    }

    /// Make loads of `level` fail (`true`) or succeed (`false`).
    pub fn set_load_failure(&self, level: impl Into<LevelId>, fail: bool) {
        let mut failing = self
            .failing_loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let level = level.into();
        if fail {
            failing.insert(level);
        } else {
            failing.remove(&level);
        }
    }

    /// Make disposal of `level` handles fail.
    pub fn fail_disposal(&self, level: impl Into<LevelId>) {
        self.failing_disposals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(level.into());
    }

    /// Every load and disposal so far, in order.
    pub fn events(&self) -> Vec<StubEvent> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LevelFactory for StubLevelFactory {
    type Handle = StubLevel;

    async fn load(&self, level: &LevelId) -> Result<StubLevel, LevelLoadError> {
        let delay = self
            .delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(level)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let fails = self
            .failing_loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(level);
        if fails {
            return Err(LevelLoadError::Load {
                level: level.clone(),
                reason: "scripted load failure".to_owned(),
            });
        }
        debug!(level = %level, "Stub level loaded");
        record(&self.log, StubEvent::Loaded(level.clone()));
        Ok(StubLevel {
            id: level.clone(),
            failing_disposals: Arc::clone(&self.failing_disposals),
            log: Arc::clone(&self.log),
        })
    }
}

/// Handle produced by [`StubLevelFactory`].
#[derive(Debug)]
pub struct StubLevel {
    id: LevelId,
    failing_disposals: Arc<Mutex<BTreeSet<LevelId>>>,
    log: EventLog,
}

impl LevelHandle for StubLevel {
    fn level_id(&self) -> &LevelId {
        &self.id
    }

    fn dispose(&mut self) -> Result<(), LevelLoadError> {
        record(&self.log, StubEvent::Disposed(self.id.clone()));
        let fails = self
            .failing_disposals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&self.id);
        if fails {
            return Err(LevelLoadError::Dispose {
                level: self.id.clone(),
                reason: "scripted disposal failure".to_owned(),
            });
        }
        Ok(())
    }
}

/// Camera positioner that records applied levels and can be made to fail.
#[derive(Debug, Default)]
pub struct StubCamera {
    applied: Mutex<Vec<LevelId>>,
    failing: AtomicBool,
}

impl StubCamera {
    /// A camera that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// Levels whose defaults were applied, in order.
    pub fn applied(&self) -> Vec<LevelId> {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CameraPositioner for StubCamera {
    fn apply_level_defaults(&self, level: &LevelId) -> Result<(), CameraError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(CameraError {
                level: level.clone(),
                reason: "scripted camera failure".to_owned(),
            });
        }
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(level.clone());
        Ok(())
    }
}
