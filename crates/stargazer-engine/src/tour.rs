//! Scripted guided tour for headless sessions.
//!
//! A tour is a list of [`TourStep`]s: plain dispatches, level travel
//! through the orchestrator, and checkpoint saves. After every step the
//! runner drains the autosave signal and any save or load a dispatched
//! step started, the way an interactive session would.

use std::sync::Arc;

use stargazer_core::Engine;
use stargazer_levels::{CameraPositioner, LevelFactory, LevelOrchestrator, TransitionOutcome};
use stargazer_persist::{PersistenceGateway, SaveStorage};
use stargazer_types::{
    Action, ContentId, ItemId, LevelId, SaveKind, SelectionMethod, Star, StarId, creators,
};
use tracing::{debug, info, warn};

use crate::error::SessionError;

/// One step of a tour.
#[derive(Debug, Clone)]
pub enum TourStep {
    /// Dispatch an action.
    Dispatch(Action),
    /// Travel to a level through the orchestrator.
    Travel(LevelId),
    /// Write a checkpoint save.
    Checkpoint,
}

/// Counts of what happened during a tour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TourSummary {
    /// Steps executed.
    pub steps: usize,
    /// Level transitions that completed.
    pub transitions: usize,
    /// Level transitions that failed (already reported through the engine).
    pub failed_transitions: usize,
    /// Saves written, autosaves included.
    pub saves: usize,
}

fn star(id: &str, name: &str, constellation: &str, position: [f32; 3]) -> Star {
    Star {
        id: StarId::new(id),
        name: name.to_owned(),
        constellation: Some(constellation.to_owned()),
        position,
    }
}

/// The default tour: the summer triangle from the observatory, a visit to
/// the planetarium, and back.
pub fn default_tour() -> Vec<TourStep> {
    let vega = star("vega", "Vega", "Lyra", [12.5, 40.0, -3.25]);
    let deneb = star("deneb", "Deneb", "Cygnus", [-8.0, 44.5, 6.75]);
    vec![
        TourStep::Dispatch(creators::time_update(1_500)),
        TourStep::Dispatch(creators::star_selected(vega, SelectionMethod::Programmatic)),
        TourStep::Dispatch(creators::star_discovered(StarId::new("vega"))),
        TourStep::Dispatch(creators::interaction_recorded("telescope")),
        TourStep::Dispatch(creators::star_selected(deneb, SelectionMethod::Programmatic)),
        TourStep::Dispatch(creators::star_discovered(StarId::new("deneb"))),
        TourStep::Dispatch(creators::star_discovered(StarId::new("altair"))),
        TourStep::Dispatch(creators::content_unlocked(ContentId::new("summer-triangle"))),
        TourStep::Dispatch(creators::time_update(4_000)),
        TourStep::Travel(LevelId::new("planetarium")),
        TourStep::Dispatch(creators::item_collected(ItemId::new("star-chart"))),
        TourStep::Dispatch(creators::interaction_recorded("orrery")),
        TourStep::Dispatch(creators::level_completed(LevelId::new("planetarium"))),
        TourStep::Checkpoint,
        TourStep::Dispatch(creators::time_update(2_500)),
        TourStep::Travel(LevelId::new("observatory")),
        TourStep::Dispatch(creators::star_deselected()),
    ]
}

/// Runs tours against a live session.
#[derive(Debug)]
pub struct TourRunner<'a, S, F: LevelFactory, C> {
    engine: &'a Arc<Engine>,
    gateway: &'a PersistenceGateway<S>,
    orchestrator: &'a LevelOrchestrator<F, C>,
}

impl<'a, S, F, C> TourRunner<'a, S, F, C>
where
    S: SaveStorage,
    F: LevelFactory,
    C: CameraPositioner,
{
    /// Borrow the session collaborators.
    pub const fn new(
        engine: &'a Arc<Engine>,
        gateway: &'a PersistenceGateway<S>,
        orchestrator: &'a LevelOrchestrator<F, C>,
    ) -> Self {
        Self {
            engine,
            gateway,
            orchestrator,
        }
    }

    /// Execute `steps` in order.
    ///
    /// Failed transitions and saves do not stop the tour; the engine has
    /// already recorded them. Only a rejected dispatch is returned.
    pub async fn run(&self, steps: Vec<TourStep>) -> Result<TourSummary, SessionError> {
        let mut summary = TourSummary::default();
        for step in steps {
            match step {
                TourStep::Dispatch(action) => {
                    let outcome = self.engine.dispatch(action)?;
                    debug!(
                        sequence = outcome.sequence,
                        action_type = %outcome.action_type,
                        changed = outcome.changed,
                        "Tour step dispatched"
                    );
                }
                TourStep::Travel(to) => match self.orchestrator.request_transition(to).await {
                    Ok(TransitionOutcome::Completed { to, duration_ms, .. }) => {
                        info!(level = %to, duration_ms, "Tour arrived");
                        summary.transitions = summary.transitions.saturating_add(1);
                    }
                    Ok(outcome) => debug!(outcome = ?outcome, "Tour travel skipped"),
                    Err(error) => {
                        warn!(error = %error, "Tour travel failed");
                        summary.failed_transitions = summary.failed_transitions.saturating_add(1);
                    }
                },
                TourStep::Checkpoint => match self.gateway.save(SaveKind::Checkpoint).await {
                    Ok(_) => summary.saves = summary.saves.saturating_add(1),
                    Err(error) => warn!(error = %error, "Checkpoint save failed"),
                },
            }
            if let Some(result) = self.gateway.autosave_if_requested().await {
                match result {
                    Ok(receipt) => {
                        debug!(size_bytes = receipt.size_bytes, "Autosaved");
                        summary.saves = summary.saves.saturating_add(1);
                    }
                    Err(error) => warn!(error = %error, "Autosave failed"),
                }
            }
            let served = self.gateway.serve_requests().await;
            if served > 0 {
                debug!(served, "Requested saves and loads completed");
            }
            summary.steps = summary.steps.saturating_add(1);
        }
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stargazer_core::EngineConfig;
    use stargazer_levels::{StubCamera, StubLevelFactory};
    use stargazer_persist::MemoryStorage;
    use stargazer_types::{ErrorComponent, Snapshot};

    use super::*;

    struct Session {
        engine: Arc<Engine>,
        gateway: PersistenceGateway<MemoryStorage>,
        orchestrator: LevelOrchestrator<StubLevelFactory, StubCamera>,
    }

    async fn session(factory: StubLevelFactory) -> Session {
        let config = EngineConfig::default();
        let engine = Engine::builder(&config)
            .initial(Snapshot::fresh(config.levels.default_level.clone()))
            .build();
        let gateway =
            PersistenceGateway::new(Arc::clone(&engine), MemoryStorage::new(), &config.persistence);
        let orchestrator = LevelOrchestrator::new(
            Arc::clone(&engine),
            factory,
            StubCamera::new(),
            &config.levels,
        );
        orchestrator.activate_initial().await.unwrap();
        Session {
            engine,
            gateway,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn default_tour_returns_to_the_observatory() {
        let s = session(StubLevelFactory::new()).await;
        let runner = TourRunner::new(&s.engine, &s.gateway, &s.orchestrator);
        let steps = default_tour();
        let expected_steps = steps.len();

        let summary = runner.run(steps).await.unwrap();

        assert_eq!(summary.steps, expected_steps);
        assert_eq!(summary.transitions, 2);
        assert_eq!(summary.failed_transitions, 0);
        assert!(summary.saves >= 1);

        let state = s.engine.state();
        assert_eq!(state.current_level, LevelId::new("observatory"));
        assert_eq!(state.previous_level, Some(LevelId::new("planetarium")));
        assert_eq!(state.stats.stars_discovered, 3);
        assert_eq!(state.stats.levels_completed, 1);
        assert!(state.selected_star.is_none());
        assert_eq!(state.session.play_time_ms, 8_000);
        assert!(s.gateway.peek().await.is_ok());
    }

    #[tokio::test]
    async fn dispatched_save_steps_are_written() {
        let s = session(StubLevelFactory::new()).await;
        let runner = TourRunner::new(&s.engine, &s.gateway, &s.orchestrator);

        runner
            .run(vec![
                TourStep::Dispatch(creators::star_discovered(StarId::new("vega"))),
                TourStep::Dispatch(
                    creators::save_game_start(SaveKind::Manual)
                        .with_source(stargazer_types::ActionSource::Ui),
                ),
            ])
            .await
            .unwrap();

        let state = s.engine.state();
        assert!(!state.persistence.saving);
        assert_eq!(state.persistence.last_save_kind, Some(SaveKind::Manual));
        let stored = s.gateway.peek().await.unwrap();
        assert_eq!(stored.snapshot.stats.stars_discovered, 1);
    }

    #[tokio::test]
    async fn failed_travel_does_not_stop_the_tour() {
        let factory = StubLevelFactory::new();
        factory.set_load_failure("planetarium", true);
        let s = session(factory).await;
        let runner = TourRunner::new(&s.engine, &s.gateway, &s.orchestrator);

        let summary = runner
            .run(vec![
                TourStep::Travel(LevelId::new("planetarium")),
                TourStep::Dispatch(creators::star_discovered(StarId::new("vega"))),
            ])
            .await
            .unwrap();

        assert_eq!(summary.steps, 2);
        assert_eq!(summary.failed_transitions, 1);
        let state = s.engine.state();
        assert_eq!(state.current_level, LevelId::new("observatory"));
        assert_eq!(state.stats.stars_discovered, 1);
        assert_eq!(
            state.errors.last.as_ref().map(|record| record.component),
            Some(ErrorComponent::LevelOrchestrator)
        );
    }
}
