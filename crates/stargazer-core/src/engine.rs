//! The dispatcher: owner of the current snapshot and the only path by which
//! it changes.
//!
//! # Dispatch sequence
//!
//! 1. Reject reentrant dispatch from the dispatching thread.
//! 2. Run middleware `before` hooks in registration order.
//! 3. Reduce.
//! 4. Validate (report-only). On errors, auto-fix. A repair queues
//!    `ERROR_RECOVERED`; anything left unrepaired queues `ERROR_OCCURRED`.
//!    The dispatch commits either way.
//! 5. Publish the new snapshot.
//! 6. Append to the bounded history.
//! 7. Notify subscribers in registration order. A failing or panicking
//!    subscriber is logged; later subscribers still run.
//! 8. Run middleware `after` hooks.
//!
//! Queued follow-up actions then run through the same sequence before
//! `dispatch` returns. Follow-ups never queue further follow-ups.
//!
//! Dispatches from different threads are serialized; nothing interleaves
//! with a dispatch in progress.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};

use stargazer_types::{
    Action, ActionSource, ActionType, ErrorComponent, ErrorRecord, ErrorSeverity, Snapshot,
    creators,
};
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::history::{ActionHistory, ActionHistoryEntry, SnapshotDigest};
use crate::middleware::{
    ActionLog, AutosaveSignal, AutosaveTrigger, DispatchTiming, Middleware, MiddlewareChain,
    PayloadGuard, PersistRequestRelay, PersistRequests, SequenceStamp, TimingHandle,
};
use crate::reducer::reduce;
use crate::registry::LevelRegistry;
use crate::validator::{ValidationResult, Validator};

/// Errors returned by [`Engine::dispatch`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// `dispatch` was called from inside a dispatch on the same thread,
    /// typically from a subscriber callback.
    #[error("reentrant dispatch of {action_type} rejected")]
    Reentrant {
        /// Type of the rejected action.
        action_type: ActionType,
    },
}

/// Errors returned by [`Engine::replay`].
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Entries were evicted, so the origin no longer leads to the present.
    #[error("history truncated: {evicted} entries evicted")]
    Truncated {
        /// Number of evicted entries.
        evicted: u64,
    },

    /// Re-reducing produced a snapshot that does not match the recorded
    /// digest.
    #[error("replay diverged at sequence {sequence}")]
    Diverged {
        /// Sequence number of the first mismatching entry.
        sequence: u64,
    },
}

/// Error a subscriber may return from a notification.
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    /// The subscriber could not handle the notification.
    #[error("subscriber failed: {reason}")]
    Failed {
        /// What went wrong.
        reason: String,
    },
}

/// Receives `(action, previous, next)` after every committed dispatch.
///
/// Implemented for any matching closure.
pub trait Subscriber: Send + Sync {
    /// Handle one committed dispatch.
    fn notify(
        &self,
        action: &Action,
        previous: &Arc<Snapshot>,
        next: &Arc<Snapshot>,
    ) -> Result<(), SubscriberError>;
}

impl<F> Subscriber for F
where
    F: Fn(&Action, &Arc<Snapshot>, &Arc<Snapshot>) -> Result<(), SubscriberError> + Send + Sync,
{
    fn notify(
        &self,
        action: &Action,
        previous: &Arc<Snapshot>,
        next: &Arc<Snapshot>,
    ) -> Result<(), SubscriberError> {
        self(action, previous, next)
    }
}

type SubscriberList = Vec<(u64, Arc<dyn Subscriber>)>;

/// Removes a subscriber registered with [`Engine::subscribe`].
///
/// Dropping the handle without calling [`unsubscribe`](Self::unsubscribe)
/// leaves the subscriber registered.
#[derive(Debug)]
pub struct UnsubscribeHandle {
    id: u64,
    list: Weak<Mutex<SubscriberList>>,
}

impl UnsubscribeHandle {
    /// Remove the subscriber. Returns `false` if it was already gone or the
    /// engine has been dropped.
    pub fn unsubscribe(self) -> bool {
        let Some(list) = self.list.upgrade() else {
            return false;
        };
        let mut list = lock(&list);
        let before = list.len();
        list.retain(|(id, _)| *id != self.id);
        list.len() != before
    }
}

/// Summary of one committed dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// History sequence number assigned to the dispatched action.
    pub sequence: u64,
    /// Type of the action as reduced.
    pub action_type: ActionType,
    /// Whether the snapshot changed.
    pub changed: bool,
    /// Validation result for the new snapshot.
    pub validation: ValidationResult,
    /// Follow-up actions dispatched after this one, in order.
    pub follow_ups: Vec<ActionType>,
}

/// Result of reduce + validate for one action.
struct Settled {
    snapshot: Arc<Snapshot>,
    validation: ValidationResult,
    follow_ups: Vec<Action>,
}

/// Clears the dispatching-thread marker on every exit path.
struct ActiveDispatch<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
}

impl<'a> ActiveDispatch<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>, thread: ThreadId) -> Self {
        *lock(slot) = Some(thread);
        Self { slot }
    }
}

impl Drop for ActiveDispatch<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = None;
    }
}

/// The session state engine.
///
/// Built once per session and shared as `Arc<Engine>` with every producer
/// and collaborator.
pub struct Engine {
    validator: Validator,
    auto_fix: bool,
    /// Also serves as the dispatch lock.
    middleware: Mutex<MiddlewareChain>,
    current: RwLock<Arc<Snapshot>>,
    history: Mutex<ActionHistory>,
    subscribers: Arc<Mutex<SubscriberList>>,
    next_subscriber: AtomicU64,
    dispatching_on: Mutex<Option<ThreadId>>,
    dispatched: AtomicU64,
    autosave: AutosaveSignal,
    persist_requests: PersistRequests,
    timing: TimingHandle,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("auto_fix", &self.auto_fix)
            .field("dispatched", &self.dispatched.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Start building an engine from configuration.
    pub fn builder(config: &EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// The current snapshot.
    pub fn state(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// The level registry the validator checks against.
    pub const fn registry(&self) -> &LevelRegistry {
        self.validator.registry()
    }

    /// Signal raised by the autosave middleware.
    pub const fn autosave_signal(&self) -> &AutosaveSignal {
        &self.autosave
    }

    /// Save and load requests relayed from producer-dispatched starts.
    pub const fn persist_requests(&self) -> &PersistRequests {
        &self.persist_requests
    }

    /// Per-action-type timing collected by the timing middleware.
    pub const fn timing(&self) -> &TimingHandle {
        &self.timing
    }

    /// Total number of committed dispatches, follow-ups included.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Acquire)
    }

    /// Copy of the dispatch history.
    pub fn history(&self) -> ActionHistory {
        lock(&self.history).clone()
    }

    /// Number of retained history entries.
    pub fn history_len(&self) -> usize {
        lock(&self.history).len()
    }

    /// Dispatch history as pretty JSON.
    pub fn history_json(&self) -> Result<String, serde_json::Error> {
        lock(&self.history).to_json()
    }

    /// Register a subscriber. Subscribers are notified in registration
    /// order.
    pub fn subscribe(&self, subscriber: impl Subscriber + 'static) -> UnsubscribeHandle {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        lock(&self.subscribers).push((id, Arc::new(subscriber)));
        UnsubscribeHandle {
            id,
            list: Arc::downgrade(&self.subscribers),
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Dispatch an action through the full pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Reentrant`] when called from inside a
    /// dispatch on the same thread. Nothing else escapes: middleware,
    /// validation and subscriber failures are logged or turned into
    /// follow-up actions.
    pub fn dispatch(&self, action: Action) -> Result<DispatchOutcome, DispatchError> {
        let me = thread::current().id();
        if *lock(&self.dispatching_on) == Some(me) {
            let action_type = action.action_type();
            error!(
                action_type = %action_type,
                "Reentrant dispatch rejected; dispatch from subscribers must be deferred"
            );
            return Err(DispatchError::Reentrant { action_type });
        }

        let mut middleware = lock(&self.middleware);
        let _active = ActiveDispatch::enter(&self.dispatching_on, me);

        let (mut outcome, follow_ups) = self.commit(&mut middleware, action, true);
        let mut queue: VecDeque<Action> = follow_ups.into();
        while let Some(follow_up) = queue.pop_front() {
            let (inner, _) = self.commit(&mut middleware, follow_up, false);
            outcome.follow_ups.push(inner.action_type);
        }
        Ok(outcome)
    }

    /// Re-reduce the full history from its origin without side effects and
    /// check every recorded digest.
    ///
    /// # Errors
    ///
    /// [`ReplayError::Truncated`] once any entry has been evicted,
    /// [`ReplayError::Diverged`] if a digest does not match.
    pub fn replay(&self) -> Result<Arc<Snapshot>, ReplayError> {
        let history = self.history();
        if !history.is_complete() {
            return Err(ReplayError::Truncated {
                evicted: history.evicted(),
            });
        }
        let mut state = Arc::clone(history.origin());
        for entry in history.entries() {
            state = self.settle(&state, &entry.action, false).snapshot;
            if !entry.digest.matches(&state) {
                return Err(ReplayError::Diverged {
                    sequence: entry.sequence,
                });
            }
        }
        Ok(state)
    }

    /// Steps 2 through 8 for one action.
    fn commit(
        &self,
        middleware: &mut MiddlewareChain,
        action: Action,
        primary: bool,
    ) -> (DispatchOutcome, Vec<Action>) {
        let previous = self.state();
        let action = middleware.run_before(action, &previous);
        let settled = self.settle(&previous, &action, primary);
        let next = settled.snapshot;

        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);

        let sequence = self.dispatched.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        lock(&self.history).push(ActionHistoryEntry {
            sequence,
            action: action.clone(),
            digest: SnapshotDigest::of(&next),
        });

        self.notify(&action, &previous, &next);
        middleware.run_after(&action, &previous, &next);

        let outcome = DispatchOutcome {
            sequence,
            action_type: action.action_type(),
            changed: !Arc::ptr_eq(&previous, &next),
            validation: settled.validation,
            follow_ups: Vec::new(),
        };
        (outcome, settled.follow_ups)
    }

    /// Reduce and validate, repairing when needed. Follow-up actions are
    /// only produced when `with_follow_ups` is set.
    fn settle(&self, previous: &Arc<Snapshot>, action: &Action, with_follow_ups: bool) -> Settled {
        let candidate = reduce(previous, action);
        if Arc::ptr_eq(&candidate, previous) {
            return Settled {
                snapshot: candidate,
                validation: ValidationResult {
                    is_valid: true,
                    ..ValidationResult::default()
                },
                follow_ups: Vec::new(),
            };
        }

        let action_type = action.action_type();
        let baseline = if replaces_snapshot(action_type) {
            None
        } else {
            Some(previous.as_ref())
        };
        let report = self.validator.validate(&candidate, baseline);
        if !report.has_errors() || !self.auto_fix {
            let follow_ups = if report.has_errors() && with_follow_ups {
                vec![validation_failure(action_type, &report)]
            } else {
                Vec::new()
            };
            if report.has_errors() {
                warn!(
                    action_type = %action_type,
                    errors = report.errors.len(),
                    "Snapshot failed validation, auto-fix disabled"
                );
            }
            return Settled {
                snapshot: candidate,
                validation: report,
                follow_ups,
            };
        }

        let (fixed, result) = self.validator.auto_fix(&candidate, baseline);
        let mut follow_ups = Vec::new();
        let snapshot = if result.auto_fix_applied {
            info!(
                action_type = %action_type,
                fixes = ?result.fixes,
                "Validator repaired snapshot"
            );
            if with_follow_ups {
                follow_ups.push(creators::error_recovered(action_type, result.fixes.clone()));
            }
            Arc::new(fixed)
        } else {
            candidate
        };
        if result.has_errors() {
            warn!(
                action_type = %action_type,
                errors = result.errors.len(),
                "Snapshot has unrepairable validation errors, committing anyway"
            );
            if with_follow_ups {
                follow_ups.push(validation_failure(action_type, &result));
            }
        }
        Settled {
            snapshot,
            validation: result,
            follow_ups,
        }
    }

    fn notify(&self, action: &Action, previous: &Arc<Snapshot>, next: &Arc<Snapshot>) {
        let subscribers: SubscriberList = lock(&self.subscribers).clone();
        for (id, subscriber) in &subscribers {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                subscriber.notify(action, previous, next)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    warn!(
                        subscriber = id,
                        action_type = %action.action_type(),
                        error = %error,
                        "Subscriber failed"
                    );
                }
                Err(_) => {
                    warn!(
                        subscriber = id,
                        action_type = %action.action_type(),
                        "Subscriber panicked"
                    );
                }
            }
        }
    }
}

/// Actions whose result legitimately replaces the previous snapshot, so
/// monotonic checks against it do not apply.
const fn replaces_snapshot(action_type: ActionType) -> bool {
    matches!(
        action_type,
        ActionType::LoadGameSuccess | ActionType::GameReset
    )
}

fn validation_failure(trigger: ActionType, result: &ValidationResult) -> Action {
    let detail = result
        .errors
        .iter()
        .map(|issue| format!("{}: {}", issue.field, issue.message))
        .collect::<Vec<_>>()
        .join("; ");
    let record = ErrorRecord::new(
        ErrorComponent::Validator,
        format!("snapshot invalid after {trigger}"),
        false,
    )
    .with_detail(detail)
    .with_severity(ErrorSeverity::Critical);
    creators::error_occurred(record, ActionSource::Engine)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    initial: Option<Snapshot>,
    extra: Vec<Box<dyn Middleware>>,
    builtins: bool,
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("builtins", &self.builtins)
            .field("extra", &self.extra.iter().map(|m| m.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Start from configuration, with the built-in middleware enabled.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
            initial: None,
            extra: Vec::new(),
            builtins: true,
        }
    }

    /// Start from `snapshot` instead of a fresh session on the default
    /// level.
    #[must_use]
    pub fn initial(mut self, snapshot: Snapshot) -> Self {
        self.initial = Some(snapshot);
        self
    }

    /// Skip the built-in middleware.
    #[must_use]
    pub const fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    /// Register additional middleware. Runs after the built-ins, in the
    /// order added.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.extra.push(Box::new(middleware));
        self
    }

    /// Build the engine.
    pub fn build(self) -> Arc<Engine> {
        let registry = LevelRegistry::from_config(&self.config.levels);
        let initial = Arc::new(
            self.initial
                .unwrap_or_else(|| Snapshot::fresh(registry.default_level().clone())),
        );
        let autosave = AutosaveSignal::new();
        let persist_requests = PersistRequests::new();
        let (timing, timing_handle) = DispatchTiming::new(&self.config.engine);

        let mut chain = MiddlewareChain::new();
        if self.builtins {
            chain.push(Box::new(SequenceStamp::new()));
            chain.push(Box::new(PayloadGuard::new(&self.config.engine)));
            chain.push(Box::new(ActionLog));
            chain.push(Box::new(timing));
            chain.push(Box::new(AutosaveTrigger::new(
                &self.config.persistence,
                autosave.clone(),
            )));
            chain.push(Box::new(PersistRequestRelay::new(persist_requests.clone())));
        }
        for entry in self.extra {
            chain.push(entry);
        }

        info!(
            level = %initial.current_level,
            middleware = ?chain.names(),
            history_capacity = self.config.engine.history_capacity,
            "Engine built"
        );

        Arc::new(Engine {
            validator: Validator::new(registry),
            auto_fix: self.config.engine.auto_fix,
            middleware: Mutex::new(chain),
            history: Mutex::new(ActionHistory::new(
                self.config.engine.history_capacity,
                Arc::clone(&initial),
            )),
            current: RwLock::new(initial),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_subscriber: AtomicU64::new(0),
            dispatching_on: Mutex::new(None),
            dispatched: AtomicU64::new(0),
            autosave,
            persist_requests,
            timing: timing_handle,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use stargazer_types::{LevelId, StarId, StatField};

    use super::*;

    fn engine() -> Arc<Engine> {
        Engine::builder(&EngineConfig::default()).build()
    }

    #[test]
    fn builtins_are_registered_in_order() {
        let engine = engine();
        assert_eq!(
            lock(&engine.middleware).names(),
            vec![
                "sequence_stamp",
                "payload_guard",
                "action_log",
                "dispatch_timing",
                "autosave_trigger",
                "persist_request_relay"
            ]
        );
    }

    #[test]
    fn dispatch_publishes_and_records() {
        let engine = engine();
        let outcome = engine
            .dispatch(creators::star_discovered(StarId::new("vega")))
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.sequence, 1);
        assert_eq!(engine.state().stats.stars_discovered, 1);
        let history = engine.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().unwrap().action.meta.sequence, Some(1));
    }

    #[test]
    fn no_op_dispatch_keeps_the_same_snapshot() {
        let engine = engine();
        let before = engine.state();
        let outcome = engine.dispatch(creators::star_deselected()).unwrap();
        assert!(!outcome.changed);
        assert!(Arc::ptr_eq(&before, &engine.state()));
        assert_eq!(engine.history_len(), 1, "no-ops are still recorded");
    }

    #[test]
    fn reentrant_dispatch_is_rejected() {
        let engine = engine();
        let rejected = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&engine);
        let counter = Arc::clone(&rejected);
        let reenter = move |_: &Action,
                            _: &Arc<Snapshot>,
                            _: &Arc<Snapshot>|
              -> Result<(), SubscriberError> {
            if let Some(engine) = weak.upgrade()
                && matches!(
                    engine.dispatch(creators::game_paused()),
                    Err(DispatchError::Reentrant { .. })
                )
            {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        };
        engine.subscribe(reenter);

        engine
            .dispatch(creators::stats_increment(StatField::Interactions, None))
            .unwrap();
        assert_eq!(rejected.load(Ordering::SeqCst), 1);
        assert!(!engine.state().lifecycle.paused);

        // The guard is released once the outer dispatch returns.
        engine.dispatch(creators::game_resumed()).unwrap();
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let engine = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let count = move |_: &Action,
                          _: &Arc<Snapshot>,
                          _: &Arc<Snapshot>|
              -> Result<(), SubscriberError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        let handle = engine.subscribe(count);
        engine.dispatch(creators::game_paused()).unwrap();
        assert!(handle.unsubscribe());
        engine.dispatch(creators::game_resumed()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.subscriber_count(), 0);
    }

    #[test]
    fn unrepairable_state_emits_error_occurred() {
        let engine = engine();
        let outcome = engine
            .dispatch(creators::level_transition_success(
                "observatory".into(),
                "atlantis".into(),
                1,
            ))
            .unwrap();
        assert!(!outcome.validation.is_valid);
        assert_eq!(outcome.follow_ups, vec![ActionType::ErrorOccurred]);
        let state = engine.state();
        assert_eq!(state.current_level, LevelId::new("atlantis"));
        assert_eq!(state.errors.occurred, 1);
        assert_eq!(
            state.errors.last.as_ref().unwrap().severity,
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn disabled_auto_fix_reports_without_repairing() {
        let mut config = EngineConfig::default();
        config.engine.auto_fix = false;
        let engine = Engine::builder(&config).build();
        engine
            .dispatch(creators::stats_update(stargazer_types::StatsPatch {
                interactions: Some(-2),
                ..Default::default()
            }))
            .unwrap();
        let state = engine.state();
        assert_eq!(state.stats.interactions, -2);
        assert_eq!(state.errors.occurred, 1);
    }

    #[test]
    fn replay_reproduces_current_state() {
        let engine = engine();
        engine
            .dispatch(creators::star_discovered(StarId::new("vega")))
            .unwrap();
        engine.dispatch(creators::time_update(500)).unwrap();
        engine
            .dispatch(creators::stats_update(stargazer_types::StatsPatch {
                interactions: Some(-1),
                ..Default::default()
            }))
            .unwrap();
        let replayed = engine.replay().unwrap();
        assert_eq!(*replayed, *engine.state());
    }

    #[test]
    fn replay_fails_after_eviction() {
        let mut config = EngineConfig::default();
        config.engine.history_capacity = 2;
        let engine = Engine::builder(&config).build();
        for _ in 0..3 {
            engine.dispatch(creators::time_update(1)).unwrap();
        }
        assert!(matches!(
            engine.replay(),
            Err(ReplayError::Truncated { evicted: 1 })
        ));
    }
}
