//! The built-in middleware, in their default registration order:
//! [`SequenceStamp`], [`PayloadGuard`], [`ActionLog`], [`DispatchTiming`],
//! [`AutosaveTrigger`], [`PersistRequestRelay`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use stargazer_types::{Action, ActionKind, ActionSource, ActionType, SaveKind, Snapshot};
use tracing::{debug, warn};

use super::{Middleware, MiddlewareError};
use crate::config::{DispatchConfig, PersistenceConfig};

/// Context key under which [`PayloadGuard`] records suspicious payloads.
pub const PAYLOAD_WARNING_TAG: &str = "payload_warning";

// ---------------------------------------------------------------------------
// SequenceStamp
// ---------------------------------------------------------------------------

/// Stamps `meta.sequence` with a monotonically increasing number.
#[derive(Debug, Default)]
pub struct SequenceStamp {
    next: u64,
}

impl SequenceStamp {
    /// Start numbering at 1.
    pub const fn new() -> Self {
        Self { next: 0 }
    }
}

impl Middleware for SequenceStamp {
    fn name(&self) -> &'static str {
        "sequence_stamp"
    }

    fn before(
        &mut self,
        action: &Action,
        _snapshot: &Snapshot,
    ) -> Result<Option<Action>, MiddlewareError> {
        self.next = self.next.saturating_add(1);
        let mut stamped = action.clone();
        stamped.meta.sequence = Some(self.next);
        Ok(Some(stamped))
    }
}

// ---------------------------------------------------------------------------
// PayloadGuard
// ---------------------------------------------------------------------------

/// Tags actions whose payloads look wrong so the problem is visible in logs
/// and history. The action itself still goes through; the reducer and
/// validator deal with the consequences.
#[derive(Debug, Clone)]
pub struct PayloadGuard {
    max_increment: i64,
    max_time_delta_ms: i64,
}

impl PayloadGuard {
    /// Build from dispatch config.
    pub const fn new(config: &DispatchConfig) -> Self {
        Self {
            max_increment: config.max_increment,
            max_time_delta_ms: config.max_time_delta_ms,
        }
    }

    fn inspect(&self, kind: &ActionKind) -> Option<&'static str> {
        match kind {
            ActionKind::StatsIncrement { amount, .. } if amount.abs() > self.max_increment => {
                Some("increment_out_of_range")
            }
            ActionKind::TimeUpdate { delta_ms } if *delta_ms > self.max_time_delta_ms => {
                Some("time_delta_too_large")
            }
            ActionKind::TimeUpdate { delta_ms } if *delta_ms < 0 => Some("negative_time_delta"),
            ActionKind::StarDiscovered { star } if star.is_blank() => Some("blank_id"),
            ActionKind::StarSelected { star, .. } if star.id.is_blank() => Some("blank_id"),
            ActionKind::ItemCollected { item } if item.is_blank() => Some("blank_id"),
            ActionKind::ContentUnlocked { content } if content.is_blank() => Some("blank_id"),
            ActionKind::LevelCompleted { level } if level.is_blank() => Some("blank_id"),
            ActionKind::Unrecognized { .. } => Some("unrecognized_type"),
            _ => None,
        }
    }
}

impl Middleware for PayloadGuard {
    fn name(&self) -> &'static str {
        "payload_guard"
    }

    fn before(
        &mut self,
        action: &Action,
        _snapshot: &Snapshot,
    ) -> Result<Option<Action>, MiddlewareError> {
        Ok(self
            .inspect(&action.kind)
            .map(|warning| action.clone().with_tag(PAYLOAD_WARNING_TAG, warning)))
    }
}

// ---------------------------------------------------------------------------
// ActionLog
// ---------------------------------------------------------------------------

/// Structured log line for every completed dispatch.
#[derive(Debug, Default)]
pub struct ActionLog;

impl Middleware for ActionLog {
    fn name(&self) -> &'static str {
        "action_log"
    }

    fn after(
        &mut self,
        action: &Action,
        previous: &Snapshot,
        next: &Snapshot,
    ) -> Result<(), MiddlewareError> {
        let changed = !std::ptr::eq(previous, next);
        if let Some(warning) = action.meta.tag(PAYLOAD_WARNING_TAG) {
            warn!(
                action_type = %action.action_type(),
                sequence = action.meta.sequence,
                source = ?action.meta.source,
                warning,
                changed,
                "Dispatched suspicious action"
            );
        } else {
            debug!(
                action_type = %action.action_type(),
                sequence = action.meta.sequence,
                source = ?action.meta.source,
                changed,
                level = %next.current_level,
                "Dispatched"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DispatchTiming
// ---------------------------------------------------------------------------

/// Aggregate timing for one action type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingStats {
    /// Number of dispatches measured.
    pub count: u64,
    /// Sum of durations, in microseconds.
    pub total_us: u64,
    /// Longest duration, in microseconds.
    pub max_us: u64,
}

impl TimingStats {
    /// Mean duration in microseconds, or 0 with no samples.
    pub fn mean_us(&self) -> u64 {
        self.total_us.checked_div(self.count).unwrap_or(0)
    }

    fn record(&mut self, micros: u64) {
        self.count = self.count.saturating_add(1);
        self.total_us = self.total_us.saturating_add(micros);
        self.max_us = self.max_us.max(micros);
    }
}

/// Shared, read-only view of the timing table.
#[derive(Debug, Clone, Default)]
pub struct TimingHandle {
    table: Arc<Mutex<BTreeMap<ActionType, TimingStats>>>,
}

impl TimingHandle {
    /// Copy of the current table.
    pub fn report(&self) -> BTreeMap<ActionType, TimingStats> {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stats for one action type.
    pub fn get(&self, action_type: ActionType) -> Option<TimingStats> {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&action_type)
            .copied()
    }
}

/// Measures wall time from `before` to `after` and warns on slow dispatches.
#[derive(Debug)]
pub struct DispatchTiming {
    started: Option<Instant>,
    warn_after: Duration,
    handle: TimingHandle,
}

impl DispatchTiming {
    /// Build from dispatch config. Returns the middleware and a handle for
    /// reading the collected stats.
    pub fn new(config: &DispatchConfig) -> (Self, TimingHandle) {
        let handle = TimingHandle::default();
        let timing = Self {
            started: None,
            warn_after: Duration::from_micros(config.slow_dispatch_warn_us),
            handle: handle.clone(),
        };
        (timing, handle)
    }
}

impl Middleware for DispatchTiming {
    fn name(&self) -> &'static str {
        "dispatch_timing"
    }

    fn before(
        &mut self,
        _action: &Action,
        _snapshot: &Snapshot,
    ) -> Result<Option<Action>, MiddlewareError> {
        self.started = Some(Instant::now());
        Ok(None)
    }

    fn after(
        &mut self,
        action: &Action,
        _previous: &Snapshot,
        _next: &Snapshot,
    ) -> Result<(), MiddlewareError> {
        let Some(started) = self.started.take() else {
            return Err(MiddlewareError::Failed {
                middleware: "dispatch_timing",
                reason: "after hook ran without a matching before".to_owned(),
            });
        };
        let elapsed = started.elapsed();
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.handle
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(action.action_type())
            .or_default()
            .record(micros);
        if elapsed > self.warn_after {
            warn!(
                action_type = %action.action_type(),
                elapsed_us = micros,
                threshold_us = u64::try_from(self.warn_after.as_micros()).unwrap_or(u64::MAX),
                "Slow dispatch"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AutosaveTrigger
// ---------------------------------------------------------------------------

/// Flag raised by [`AutosaveTrigger`] and drained by whoever owns the
/// persistence gateway.
#[derive(Debug, Clone, Default)]
pub struct AutosaveSignal {
    raised: Arc<AtomicBool>,
}

impl AutosaveSignal {
    /// Create a lowered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Whether the signal is raised, without lowering it.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Lower the signal, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }
}

/// Counts progress actions and raises an [`AutosaveSignal`] every
/// `autosave_every` of them, rate-limited by `autosave_min_interval_ms`.
///
/// Nothing is raised while the session is memory-only or the player has
/// turned autosave off.
#[derive(Debug)]
pub struct AutosaveTrigger {
    every: u32,
    min_interval: Duration,
    pending: u32,
    last_raised: Option<Instant>,
    signal: AutosaveSignal,
}

impl AutosaveTrigger {
    /// Build from persistence config, raising `signal`.
    pub const fn new(config: &PersistenceConfig, signal: AutosaveSignal) -> Self {
        Self {
            every: config.autosave_every,
            min_interval: Duration::from_millis(config.autosave_min_interval_ms),
            pending: 0,
            last_raised: None,
            signal,
        }
    }
}

impl Middleware for AutosaveTrigger {
    fn name(&self) -> &'static str {
        "autosave_trigger"
    }

    fn after(
        &mut self,
        action: &Action,
        previous: &Snapshot,
        next: &Snapshot,
    ) -> Result<(), MiddlewareError> {
        if self.every == 0 || !action.action_type().is_progress() || std::ptr::eq(previous, next) {
            return Ok(());
        }
        self.pending = self.pending.saturating_add(1);
        if self.pending < self.every {
            return Ok(());
        }
        if next.persistence.memory_only || !next.settings.autosave_enabled {
            debug!(
                memory_only = next.persistence.memory_only,
                autosave_enabled = next.settings.autosave_enabled,
                "Autosave skipped"
            );
            return Ok(());
        }
        if self
            .last_raised
            .is_some_and(|at| at.elapsed() < self.min_interval)
        {
            return Ok(());
        }
        self.pending = 0;
        self.last_raised = Some(Instant::now());
        self.signal.raise();
        debug!(action_type = %action.action_type(), "Autosave requested");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PersistRequestRelay
// ---------------------------------------------------------------------------

/// Save or load work asked for by a producer dispatching a `*_START` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistRequest {
    /// Write a save of this kind.
    Save(SaveKind),
    /// Restore the saved game.
    Load,
}

/// Queue filled by [`PersistRequestRelay`] and drained by whoever owns the
/// persistence gateway.
#[derive(Debug, Clone, Default)]
pub struct PersistRequests {
    queue: Arc<Mutex<VecDeque<PersistRequest>>>,
}

impl PersistRequests {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request.
    pub fn push(&self, request: PersistRequest) {
        self.lock().push_back(request);
    }

    /// Put a request back at the head of the queue.
    pub fn requeue(&self, request: PersistRequest) {
        self.lock().push_front(request);
    }

    /// Take the oldest request.
    pub fn pop(&self) -> Option<PersistRequest> {
        self.lock().pop_front()
    }

    /// Number of requests waiting.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PersistRequest>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Turns `SAVE_GAME_START` and `LOAD_GAME_START` dispatched by producers into
/// [`PersistRequest`]s.
///
/// Starts emitted by the gateway itself are ignored, as are starts the
/// reducer dropped because the same operation was already running.
#[derive(Debug)]
pub struct PersistRequestRelay {
    requests: PersistRequests,
}

impl PersistRequestRelay {
    /// Relay into `requests`.
    pub const fn new(requests: PersistRequests) -> Self {
        Self { requests }
    }
}

impl Middleware for PersistRequestRelay {
    fn name(&self) -> &'static str {
        "persist_request_relay"
    }

    fn after(
        &mut self,
        action: &Action,
        previous: &Snapshot,
        next: &Snapshot,
    ) -> Result<(), MiddlewareError> {
        if action.meta.source == ActionSource::Persistence || std::ptr::eq(previous, next) {
            return Ok(());
        }
        let request = match action.kind {
            ActionKind::SaveGameStart { kind } => PersistRequest::Save(kind),
            ActionKind::LoadGameStart => PersistRequest::Load,
            _ => return Ok(()),
        };
        self.requests.push(request);
        debug!(request = ?request, source = ?action.meta.source, "Persistence requested");
        Ok(())
    }
}
