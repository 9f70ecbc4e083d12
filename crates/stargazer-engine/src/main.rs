//! Headless session runner for the Stargazer exploration engine.
//!
//! This is the entry point that wires together the state engine, the
//! persistence gateway, and the level orchestrator. It restores the last
//! saved game, plays a scripted tour through the engine, and saves on the
//! way out. Rendering, audio, and input live in the host application; here
//! the level factory and camera are in-process stubs.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `stargazer-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the engine and register the notifier
//! 4. Open save storage and restore the saved game, if any
//! 5. Mark the session initialized
//! 6. Activate the current level
//! 7. Run the guided tour
//! 8. Write the exit save
//! 9. Log the session summary

mod error;
mod notifier;
mod tour;

use std::path::Path;
use std::sync::Arc;

use stargazer_core::{Engine, EngineConfig};
use stargazer_levels::{LevelOrchestrator, StubCamera, StubLevelFactory};
use stargazer_persist::{FileStorage, PersistenceGateway};
use stargazer_types::{SaveKind, Snapshot, creators};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::SessionError;
use crate::notifier::Notifier;
use crate::tour::TourRunner;

/// Application entry point for the session runner.
///
/// # Errors
///
/// Returns an error if configuration is invalid, logging cannot be
/// installed, the initial level cannot be loaded, or a dispatch is
/// rejected.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config)?;
    info!("stargazer-engine starting");
    info!(
        default_level = %config.levels.default_level,
        levels = config.levels.registry.len(),
        history_capacity = config.engine.history_capacity,
        storage_dir = %config.persistence.storage_dir.display(),
        "Configuration loaded"
    );

    // 3. Build the engine.
    let engine = Engine::builder(&config)
        .initial(Snapshot::fresh(config.levels.default_level.clone()))
        .build();
    let notifier = Notifier::new();
    let _subscription = engine.subscribe(notifier.clone());
    info!(session_id = %engine.state().session.session_id, "Engine ready");

    // 4. Restore the saved game. Any failure leaves the fresh session in place.
    let storage = FileStorage::new(config.persistence.storage_dir.clone());
    let gateway = PersistenceGateway::new(Arc::clone(&engine), storage, &config.persistence);
    match gateway.load().await {
        Ok(loaded) => info!(
            level = %loaded.snapshot.current_level,
            schema_version = loaded.schema_version,
            migrated = loaded.migrated,
            "Saved game restored"
        ),
        Err(error) if error.is_not_found() => {}
        Err(error) => warn!(error = %error, "Continuing with a fresh session"),
    }

    // 5. Mark the session initialized.
    engine.dispatch(creators::game_initialized())?;

    // 6. Activate the current level.
    let orchestrator = LevelOrchestrator::new(
        Arc::clone(&engine),
        StubLevelFactory::new(),
        StubCamera::new(),
        &config.levels,
    );
    orchestrator
        .activate_initial()
        .await
        .map_err(SessionError::from)?;

    // 7. Run the guided tour.
    let summary = TourRunner::new(&engine, &gateway, &orchestrator)
        .run(tour::default_tour())
        .await?;
    info!(
        steps = summary.steps,
        transitions = summary.transitions,
        failed_transitions = summary.failed_transitions,
        saves = summary.saves,
        "Tour finished"
    );

    // 8. Write the exit save.
    match gateway.save(SaveKind::Manual).await {
        Ok(receipt) => info!(size_bytes = receipt.size_bytes, "Exit save written"),
        Err(error) => warn!(error = %error, "Exit save failed"),
    }

    // 9. Log the session summary.
    log_summary(&engine, &notifier);
    Ok(())
}

/// Load configuration from `stargazer-config.yaml`.
///
/// Looks for the config file relative to the current working directory.
/// Environment overrides apply whether or not the file exists.
fn load_config() -> Result<EngineConfig, SessionError> {
    let config_path = Path::new("stargazer-config.yaml");
    if config_path.exists() {
        Ok(EngineConfig::from_file(config_path)?)
    } else {
        let mut config = EngineConfig::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(config: &EngineConfig) -> Result<(), SessionError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };
    installed.map_err(|error| SessionError::Logging {
        message: error.to_string(),
    })
}

fn log_summary(engine: &Engine, notifier: &Notifier) {
    let state = engine.state();
    info!(
        level = %state.current_level,
        stars_discovered = state.stats.stars_discovered,
        levels_completed = state.stats.levels_completed,
        items_collected = state.stats.items_collected,
        interactions = state.stats.interactions,
        play_time_ms = state.session.play_time_ms,
        errors = state.errors.occurred,
        recovered = state.errors.recovered,
        notices = notifier.notices().len(),
        "Session summary"
    );
    info!(
        dispatched = engine.dispatched(),
        history = engine.history_len(),
        "Dispatch totals"
    );
    for (action_type, timing) in engine.timing().report() {
        info!(
            action_type = %action_type,
            count = timing.count,
            mean_us = timing.mean_us(),
            max_us = timing.max_us,
            "Dispatch timing"
        );
    }
    match engine.replay() {
        Ok(_) => info!("History replay matches the live session"),
        Err(error) => warn!(error = %error, "History replay unavailable"),
    }
}
