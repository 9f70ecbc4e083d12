//! Save/load behavior of the persistence gateway against a live engine.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::too_many_lines
)]

use std::sync::Arc;
use std::time::Duration;

use stargazer_core::{Engine, EngineConfig};
use stargazer_persist::{
    FileStorage, MemoryStorage, MigrationError, PersistError, PersistenceGateway, SaveStorage,
    StorageError,
};
use stargazer_types::{
    ActionSource, ActionType, ErrorComponent, ErrorSeverity, LevelId, SaveKind, SettingsPatch,
    Snapshot, StarId, StatField, TimelineEvent, creators,
};

fn engine() -> Arc<Engine> {
    Engine::builder(&EngineConfig::default()).build()
}

fn gateway<S: SaveStorage>(engine: &Arc<Engine>, storage: S) -> PersistenceGateway<S> {
    PersistenceGateway::new(
        Arc::clone(engine),
        storage,
        &EngineConfig::default().persistence,
    )
}

fn play(engine: &Engine) {
    let actions = vec![
        creators::game_initialized(),
        creators::star_discovered(StarId::new("vega")),
        creators::star_discovered(StarId::new("deneb")),
        creators::stats_increment(StatField::Interactions, Some(4)),
        creators::time_update(12_000),
        creators::settings_update(SettingsPatch {
            field_of_view: Some(90.0),
            invert_y: Some(true),
            ..SettingsPatch::default()
        }),
        creators::timeline_events_set(vec![TimelineEvent {
            id: "perseids".to_owned(),
            label: "Perseid shower".to_owned(),
            at_ms: 60_000,
            star: None,
        }]),
        creators::level_transition_success(
            LevelId::new("observatory"),
            LevelId::new("planetarium"),
            40,
        ),
        creators::item_collected("star-chart".into()),
        creators::level_completed(LevelId::new("observatory")),
    ];
    for action in actions {
        engine.dispatch(action).expect("dispatch");
    }
}

// =============================================================================
// Round trip
// =============================================================================

#[tokio::test]
async fn load_restores_what_save_wrote() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());

    let original = engine();
    play(&original);
    let saver = gateway(&original, storage.clone());
    let receipt = saver.save(SaveKind::Manual).await.expect("save");
    assert!(receipt.size_bytes > 0);

    let saved_state = original.state();
    assert_eq!(saved_state.persistence.last_saved_at, Some(receipt.saved_at));
    assert!(!saved_state.persistence.saving);

    let restored = engine();
    let loader = gateway(&restored, storage);
    let loaded = loader.load().await.expect("load");
    assert_eq!(loaded.schema_version, stargazer_persist::CURRENT_SCHEMA_VERSION);
    assert!(!loaded.migrated);

    // Everything but the running session's identity comes from the save.
    let state = restored.state();
    let mut expected = Snapshot::clone(&saved_state);
    expected.session.session_id = state.session.session_id;
    expected.session.started_at = state.session.started_at;
    expected.lifecycle = state.lifecycle;
    assert_eq!(*state, expected);
    assert!(!state.persistence.loading);
    assert!(!state.persistence.saving);
}

#[tokio::test]
async fn saved_record_matches_the_settled_session() {
    let engine = engine();
    play(&engine);
    let gateway = gateway(&engine, MemoryStorage::new());
    let receipt = gateway.save(SaveKind::Checkpoint).await.expect("save");

    let stored = gateway.peek().await.expect("peek");
    assert_eq!(stored.saved_at, receipt.saved_at);
    assert!(!stored.snapshot.persistence.saving);
    assert_eq!(stored.snapshot.persistence.last_saved_at, Some(receipt.saved_at));
    assert_eq!(
        stored.snapshot.persistence.last_save_kind,
        Some(SaveKind::Checkpoint)
    );
    assert_eq!(stored.snapshot, *engine.state());
}

// =============================================================================
// Failure paths
// =============================================================================

#[tokio::test]
async fn missing_record_is_a_quiet_failure() {
    let engine = engine();
    let gateway = gateway(&engine, MemoryStorage::new());
    let error = gateway.load().await.expect_err("nothing saved");
    assert!(error.is_not_found());

    let state = engine.state();
    assert_eq!(state.errors.occurred, 0);
    assert!(!state.persistence.loading);
    assert!(state.persistence.last_error.is_some());
    assert_eq!(state.current_level, LevelId::new("observatory"));
}

#[tokio::test]
async fn corrupt_record_raises_an_error() {
    let engine = engine();
    let storage = MemoryStorage::new();
    storage.insert_raw("stargazer.save", "{not json");
    let gateway = gateway(&engine, storage);

    let error = gateway.load().await.expect_err("corrupt");
    assert!(matches!(error, PersistError::Corrupt { .. }));
    let state = engine.state();
    assert_eq!(state.errors.occurred, 1);
    assert_eq!(state.stats.stars_discovered, 0, "falls back to the default snapshot");
}

#[tokio::test]
async fn newer_schema_is_rejected() {
    let engine = engine();
    let storage = MemoryStorage::new();
    let record = serde_json::json!({"schemaVersion": 9, "savedAt": 0, "snapshot": {}});
    storage.insert_raw("stargazer.save", record.to_string());
    let gateway = gateway(&engine, storage);

    let error = gateway.load().await.expect_err("too new");
    assert!(matches!(
        error,
        PersistError::Migration(MigrationError::UnsupportedVersion { found: 9, .. })
    ));
}

#[tokio::test]
async fn version_one_saves_are_migrated() {
    let engine = engine();
    let session = engine.state().session.clone();
    let storage = MemoryStorage::new();
    let record = serde_json::json!({
        "schemaVersion": 1,
        "savedAt": 1_700_000_000_000_i64,
        "snapshot": {
            "currentLevel": "planetarium",
            "discoveredStars": ["altair", "vega"],
            "stats": {"discoveries": 2, "interactions": 9},
            "settings": {"masterVolume": 0.4},
            "session": {
                "sessionId": session.session_id,
                "startedAt": session.started_at,
                "playTimeMs": 90_000,
                "homeLevel": "observatory"
            }
        }
    });
    storage.insert_raw("stargazer.save", record.to_string());
    let gateway = gateway(&engine, storage);

    let loaded = gateway.load().await.expect("migrated load");
    assert_eq!(loaded.schema_version, 1);
    assert!(loaded.migrated);

    let state = engine.state();
    assert_eq!(state.current_level, LevelId::new("planetarium"));
    assert_eq!(state.stats.stars_discovered, 2);
    assert_eq!(state.stats.interactions, 9);
    assert!((state.settings.field_of_view - 75.0).abs() < f32::EPSILON);
    assert!((state.settings.master_volume - 0.4).abs() < f32::EPSILON);
    assert!(state.collected_items.is_empty());
    assert_eq!(state.session.play_time_ms, 90_000);
}

#[tokio::test]
async fn failed_save_degrades_to_memory_only() {
    let engine = engine();
    let storage = MemoryStorage::new();
    storage.reject_writes(true);
    let gateway = gateway(&engine, storage);

    let error = gateway.save(SaveKind::Manual).await.expect_err("rejected");
    assert!(matches!(
        error,
        PersistError::Storage(StorageError::Unavailable { .. })
    ));

    let state = engine.state();
    assert!(state.persistence.memory_only);
    assert!(!state.persistence.saving);
    assert_eq!(state.errors.occurred, 1);
    assert_eq!(
        state.errors.last.as_ref().unwrap().severity,
        ErrorSeverity::High
    );

    // Autosave stays off while memory-only.
    engine.autosave_signal().raise();
    assert!(gateway.autosave_if_requested().await.is_none());

    // A later manual save that succeeds clears the flag.
    gateway.storage().reject_writes(false);
    gateway.save(SaveKind::Manual).await.expect("save");
    assert!(!engine.state().persistence.memory_only);
}

// =============================================================================
// Autosave and the storage lease
// =============================================================================

#[tokio::test]
async fn autosave_runs_when_requested() {
    let mut config = EngineConfig::default();
    config.persistence.autosave_every = 2;
    config.persistence.autosave_min_interval_ms = 0;
    let engine = Engine::builder(&config).build();
    let gateway = PersistenceGateway::new(
        Arc::clone(&engine),
        MemoryStorage::new(),
        &config.persistence,
    );

    assert!(gateway.autosave_if_requested().await.is_none());
    engine
        .dispatch(creators::star_discovered(StarId::new("vega")))
        .unwrap();
    engine
        .dispatch(creators::star_discovered(StarId::new("rigel")))
        .unwrap();

    let receipt = gateway
        .autosave_if_requested()
        .await
        .expect("autosave pending")
        .expect("autosave succeeded");
    assert_eq!(receipt.kind, SaveKind::Auto);
    assert_eq!(engine.state().persistence.last_save_kind, Some(SaveKind::Auto));
    assert!(gateway.storage().get_raw("stargazer.save").is_some());
}

#[tokio::test]
async fn producer_dispatched_save_is_completed_by_the_gateway() {
    let engine = engine();
    play(&engine);
    let gateway = gateway(&engine, MemoryStorage::new());

    engine
        .dispatch(creators::save_game_start(SaveKind::Manual).with_source(ActionSource::Ui))
        .unwrap();
    assert!(engine.state().persistence.saving);
    assert_eq!(engine.persist_requests().len(), 1);

    assert_eq!(gateway.serve_requests().await, 1);
    assert!(engine.persist_requests().is_empty());

    let state = engine.state();
    assert!(!state.persistence.saving);
    assert_eq!(state.persistence.last_save_kind, Some(SaveKind::Manual));
    assert!(gateway.storage().get_raw("stargazer.save").is_some());

    // Only the producer's start is in the history; the gateway added the outcome.
    let history = engine.history();
    let starts = history
        .entries()
        .filter(|entry| entry.action.action_type() == ActionType::SaveGameStart)
        .count();
    assert_eq!(starts, 1);
    assert_eq!(
        history.latest().unwrap().action.action_type(),
        ActionType::SaveGameSuccess
    );
}

#[tokio::test]
async fn producer_dispatched_load_is_completed_by_the_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());
    let original = engine();
    play(&original);
    gateway(&original, storage.clone())
        .save(SaveKind::Manual)
        .await
        .expect("save");

    let engine = engine();
    let gateway = gateway(&engine, storage);
    engine
        .dispatch(creators::load_game_start().with_source(ActionSource::Ui))
        .unwrap();
    assert!(engine.state().persistence.loading);

    assert_eq!(gateway.serve_requests().await, 1);
    let state = engine.state();
    assert!(!state.persistence.loading);
    assert_eq!(state.stats, original.state().stats);
    assert_eq!(state.current_level, original.state().current_level);
}

#[tokio::test]
async fn unusable_save_reports_a_load_failure() {
    let engine = engine();
    let storage = MemoryStorage::new();
    storage.insert_raw("stargazer.save", "{not json");
    let gateway = gateway(&engine, storage);
    engine
        .dispatch(creators::load_game_start().with_source(ActionSource::Ui))
        .unwrap();

    assert_eq!(gateway.serve_requests().await, 1);
    let state = engine.state();
    assert!(!state.persistence.loading);
    let record = state.errors.last.as_ref().unwrap();
    assert_eq!(record.component, ErrorComponent::Persistence);
    assert_eq!(record.operation, Some(ActionType::LoadGameStart));
    assert_eq!(record.severity, ErrorSeverity::Medium);
    assert!(
        stargazer_core::report::user_message(record)
            .body
            .contains("could not be loaded")
    );
}

/// Storage whose writes take a while, so two saves can overlap.
struct SlowStorage {
    inner: MemoryStorage,
    delay: Duration,
}

impl SaveStorage for SlowStorage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        tokio::time::sleep(self.delay).await;
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        tokio::time::sleep(self.delay).await;
        self.inner.write(key, bytes).await
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.remove(key).await
    }
}

#[tokio::test(start_paused = true)]
async fn overlapping_saves_are_rejected_not_queued() {
    let engine = engine();
    let gateway = gateway(
        &engine,
        SlowStorage {
            inner: MemoryStorage::new(),
            delay: Duration::from_millis(500),
        },
    );

    let (first, second) = tokio::join!(
        gateway.save(SaveKind::Manual),
        gateway.save(SaveKind::Auto)
    );
    assert!(first.is_ok());
    assert!(matches!(second, Err(PersistError::StorageBusy)));
    assert!(!gateway.is_busy(), "lease released after the save");
    assert_eq!(
        engine.state().persistence.last_save_kind,
        Some(SaveKind::Manual)
    );
}
