//! Level transition state machine against a live engine and stub
//! collaborators. Time is paused so load delays and timeouts are exact.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::too_many_lines
)]

use std::sync::Arc;
use std::time::Duration;

use stargazer_core::{Engine, EngineConfig};
use stargazer_levels::{
    LevelLoadError, LevelOrchestrator, StubCamera, StubEvent, StubLevelFactory, TransitionError,
    TransitionOutcome, TransitionPhase,
};
use stargazer_types::{ActionKind, ActionType, ErrorSeverity, LevelId};

type Orchestrator = LevelOrchestrator<StubLevelFactory, StubCamera>;

fn level(id: &str) -> LevelId {
    LevelId::new(id)
}

async fn setup(factory: StubLevelFactory) -> (Arc<Engine>, Arc<Orchestrator>) {
    let config = EngineConfig::default();
    let engine = Engine::builder(&config).build();
    let orchestrator = Arc::new(LevelOrchestrator::new(
        Arc::clone(&engine),
        factory,
        StubCamera::new(),
        &config.levels,
    ));
    orchestrator
        .activate_initial()
        .await
        .expect("initial level loads");
    (engine, orchestrator)
}

fn dispatched(engine: &Engine) -> Vec<ActionType> {
    engine
        .history()
        .entries()
        .map(|entry| entry.action.action_type())
        .collect()
}

fn count(engine: &Engine, wanted: ActionType) -> usize {
    dispatched(engine)
        .into_iter()
        .filter(|action_type| *action_type == wanted)
        .count()
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test(start_paused = true)]
async fn transition_walks_every_phase() {
    let factory = StubLevelFactory::new().with_delay("miranda", Duration::from_millis(250));
    let (engine, orchestrator) = setup(factory).await;
    assert_eq!(orchestrator.phase(), TransitionPhase::Idle);
    assert_eq!(orchestrator.active_level(), Some(level("observatory")));

    let outcome = orchestrator
        .request_transition(level("miranda"))
        .await
        .expect("transition");
    match outcome {
        TransitionOutcome::Completed {
            from,
            to,
            duration_ms,
        } => {
            assert_eq!(from, level("observatory"));
            assert_eq!(to, level("miranda"));
            assert_eq!(duration_ms, 250);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let state = engine.state();
    assert_eq!(state.current_level, level("miranda"));
    assert_eq!(state.previous_level, Some(level("observatory")));
    assert!(state.transition.is_none());
    assert_eq!(orchestrator.phase(), TransitionPhase::Idle);
    assert_eq!(orchestrator.active_level(), Some(level("miranda")));
    assert_eq!(
        dispatched(&engine),
        vec![
            ActionType::LevelTransitionStart,
            ActionType::LevelTransitionSuccess
        ]
    );
    assert_eq!(
        orchestrator.factory().events(),
        vec![
            StubEvent::Loaded(level("observatory")),
            StubEvent::Disposed(level("observatory")),
            StubEvent::Loaded(level("miranda")),
        ]
    );
    assert_eq!(
        orchestrator.camera().applied(),
        vec![level("observatory"), level("miranda")]
    );
}

#[tokio::test(start_paused = true)]
async fn same_level_is_unchanged() {
    let (engine, orchestrator) = setup(StubLevelFactory::new()).await;
    let outcome = orchestrator
        .request_transition(level("observatory"))
        .await
        .expect("no-op");
    assert_eq!(outcome, TransitionOutcome::Unchanged);
    assert!(dispatched(&engine).is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_level_is_reported_without_starting() {
    let (engine, orchestrator) = setup(StubLevelFactory::new()).await;
    let error = orchestrator
        .request_transition(level("atlantis"))
        .await
        .expect_err("unknown");
    assert!(matches!(error, TransitionError::UnknownLevel { .. }));
    assert_eq!(dispatched(&engine), vec![ActionType::ErrorOccurred]);
    let record = engine.state().errors.last.clone().unwrap();
    assert_eq!(
        record.component,
        stargazer_types::ErrorComponent::LevelOrchestrator
    );
    assert_eq!(orchestrator.phase(), TransitionPhase::Idle);
}

// =============================================================================
// Failure and rollback
// =============================================================================

#[tokio::test(start_paused = true)]
async fn load_failure_rolls_back_and_accepts_new_requests() {
    let (engine, orchestrator) = setup(StubLevelFactory::new()).await;
    orchestrator.factory().set_load_failure("forest", true);

    let error = orchestrator
        .request_transition(level("forest"))
        .await
        .expect_err("scripted failure");
    assert!(matches!(
        error,
        TransitionError::Level(LevelLoadError::Load { .. })
    ));
    assert_eq!(orchestrator.phase(), TransitionPhase::Failed);
    assert_eq!(orchestrator.active_level(), Some(level("observatory")));

    let state = engine.state();
    assert_eq!(state.current_level, level("observatory"));
    assert!(state.transition.is_none());
    assert_eq!(state.errors.occurred, 1);
    assert_eq!(
        dispatched(&engine),
        vec![
            ActionType::LevelTransitionStart,
            ActionType::LevelTransitionFailure,
            ActionType::ErrorOccurred,
        ]
    );

    orchestrator.factory().set_load_failure("forest", false);
    let outcome = orchestrator
        .request_transition(level("forest"))
        .await
        .expect("retry from Failed");
    assert!(matches!(outcome, TransitionOutcome::Completed { .. }));
    assert_eq!(engine.state().current_level, level("forest"));
    assert_eq!(orchestrator.phase(), TransitionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn slow_load_times_out() {
    let factory = StubLevelFactory::new().with_delay("planetarium", Duration::from_secs(60));
    let (engine, orchestrator) = setup(factory).await;

    let error = orchestrator
        .request_transition(level("planetarium"))
        .await
        .expect_err("timeout");
    assert!(matches!(
        error,
        TransitionError::Timeout {
            timeout_ms: 15_000,
            ..
        }
    ));
    assert_eq!(engine.state().current_level, level("observatory"));
    assert_eq!(count(&engine, ActionType::LevelTransitionFailure), 1);
    assert_eq!(count(&engine, ActionType::LevelTransitionSuccess), 0);
}

#[tokio::test(start_paused = true)]
async fn disposal_failure_fails_the_transition() {
    let (engine, orchestrator) = setup(StubLevelFactory::new()).await;
    orchestrator.factory().fail_disposal("observatory");

    let error = orchestrator
        .request_transition(level("miranda"))
        .await
        .expect_err("dispose fails");
    assert!(matches!(
        error,
        TransitionError::Level(LevelLoadError::Dispose { .. })
    ));
    assert_eq!(engine.state().current_level, level("observatory"));
    assert_eq!(orchestrator.phase(), TransitionPhase::Failed);
    assert_eq!(orchestrator.active_level(), Some(level("observatory")));
}

#[tokio::test(start_paused = true)]
async fn camera_failure_is_minor() {
    let (engine, orchestrator) = setup(StubLevelFactory::new()).await;
    orchestrator.camera().set_failing(true);

    let outcome = orchestrator
        .request_transition(level("planetarium"))
        .await
        .expect("transition still succeeds");
    assert!(matches!(outcome, TransitionOutcome::Completed { .. }));
    let state = engine.state();
    assert_eq!(state.current_level, level("planetarium"));
    assert_eq!(
        state.errors.last.as_ref().unwrap().severity,
        ErrorSeverity::Low
    );
}

// =============================================================================
// Supersession
// =============================================================================

#[tokio::test(start_paused = true)]
async fn newer_request_supersedes_in_flight_load() {
    let factory = StubLevelFactory::new()
        .with_delay("miranda", Duration::from_secs(1))
        .with_delay("forest", Duration::from_millis(100));
    let (engine, orchestrator) = setup(factory).await;

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.request_transition(level("miranda")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(orchestrator.phase(), TransitionPhase::Loading);

    let second = orchestrator
        .request_transition(level("forest"))
        .await
        .expect("second transition");
    assert!(matches!(second, TransitionOutcome::Completed { .. }));

    let first = first.await.expect("task").expect("superseded, not failed");
    assert_eq!(first, TransitionOutcome::Superseded);

    let state = engine.state();
    assert_eq!(state.current_level, level("forest"));
    assert_eq!(state.previous_level, Some(level("observatory")));
    assert_eq!(orchestrator.active_level(), Some(level("forest")));
    assert_eq!(orchestrator.phase(), TransitionPhase::Idle);

    // Exactly one outcome, and it belongs to the newer request.
    let outcomes: Vec<LevelId> = engine
        .history()
        .entries()
        .filter_map(|entry| match &entry.action.kind {
            ActionKind::LevelTransitionSuccess { to, .. }
            | ActionKind::LevelTransitionFailure { to, .. } => Some(to.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(outcomes, vec![level("forest")]);
    assert_eq!(count(&engine, ActionType::LevelTransitionStart), 2);

    // The stale miranda load was disposed on arrival.
    assert_eq!(
        orchestrator.factory().events(),
        vec![
            StubEvent::Loaded(level("observatory")),
            StubEvent::Disposed(level("observatory")),
            StubEvent::Loaded(level("forest")),
            StubEvent::Loaded(level("miranda")),
            StubEvent::Disposed(level("miranda")),
        ]
    );
}
