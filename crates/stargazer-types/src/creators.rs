//! Typed action creators.
//!
//! Producers never assemble [`ActionKind`] values by hand; they call the
//! creator for the intent they want so the payload shape is checked at the
//! call site. Each creator attributes the action to the producer that
//! usually emits it; use [`Action::with_source`] to override.

use chrono::{DateTime, Utc};

use crate::actions::{Action, ActionKind};
use crate::enums::{ActionSource, ActionType, SaveKind, SelectionMethod, StatField};
use crate::ids::{ContentId, ItemId, LevelId, SessionId, StarId};
use crate::snapshot::Snapshot;
use crate::structs::{ErrorRecord, SettingsPatch, Star, StatsPatch, TimelineEvent};

// --- Level lifecycle ---

/// `LEVEL_TRANSITION_START{from, to}`.
pub fn level_transition_start(from: LevelId, to: LevelId) -> Action {
    Action::new(ActionKind::LevelTransitionStart { from, to }, ActionSource::Orchestrator)
}

/// `LEVEL_TRANSITION_SUCCESS{from, to, durationMs}`.
pub fn level_transition_success(from: LevelId, to: LevelId, duration_ms: u64) -> Action {
    Action::new(
        ActionKind::LevelTransitionSuccess {
            from,
            to,
            duration_ms,
        },
        ActionSource::Orchestrator,
    )
}

/// `LEVEL_TRANSITION_FAILURE{from, to, error}`.
pub fn level_transition_failure(from: LevelId, to: LevelId, error: impl Into<String>) -> Action {
    Action::new(
        ActionKind::LevelTransitionFailure {
            from,
            to,
            error: error.into(),
        },
        ActionSource::Orchestrator,
    )
}

/// `LEVEL_COMPLETED{level}`.
pub fn level_completed(level: LevelId) -> Action {
    Action::new(ActionKind::LevelCompleted { level }, ActionSource::Physics)
}

// --- Selection ---

/// `STAR_SELECTED{star, method}`.
pub fn star_selected(star: Star, method: SelectionMethod) -> Action {
    Action::new(ActionKind::StarSelected { star, method }, ActionSource::Ui)
}

/// `STAR_DESELECTED`.
pub fn star_deselected() -> Action {
    Action::new(ActionKind::StarDeselected, ActionSource::Ui)
}

/// `STAR_DISCOVERED{star}`.
pub fn star_discovered(star: StarId) -> Action {
    Action::new(ActionKind::StarDiscovered { star }, ActionSource::Physics)
}

// --- Progress ---

/// `STATS_UPDATE{updates}`.
pub fn stats_update(updates: StatsPatch) -> Action {
    Action::new(ActionKind::StatsUpdate { updates }, ActionSource::Ui)
}

/// `STATS_INCREMENT{field, amount}`; `amount` defaults to 1.
pub fn stats_increment(field: StatField, amount: Option<i64>) -> Action {
    Action::new(
        ActionKind::StatsIncrement {
            field,
            amount: amount.unwrap_or(1),
        },
        ActionSource::Ui,
    )
}

/// `CONTENT_UNLOCKED{content}`.
pub fn content_unlocked(content: ContentId) -> Action {
    Action::new(ActionKind::ContentUnlocked { content }, ActionSource::Physics)
}

/// `ITEM_COLLECTED{item}`.
pub fn item_collected(item: ItemId) -> Action {
    Action::new(ActionKind::ItemCollected { item }, ActionSource::Physics)
}

/// `INTERACTION_RECORDED{target}`.
pub fn interaction_recorded(target: impl Into<String>) -> Action {
    Action::new(
        ActionKind::InteractionRecorded {
            target: target.into(),
        },
        ActionSource::Input,
    )
}

// --- Settings ---

/// `SETTINGS_UPDATE{updates}`.
pub fn settings_update(updates: SettingsPatch) -> Action {
    Action::new(ActionKind::SettingsUpdate { updates }, ActionSource::Ui)
}

/// `SETTINGS_RESET`.
pub fn settings_reset() -> Action {
    Action::new(ActionKind::SettingsReset, ActionSource::Ui)
}

// --- Session ---

/// `SESSION_START{sessionId, startedAt}`.
pub fn session_start(session_id: SessionId, started_at: DateTime<Utc>) -> Action {
    Action::new(
        ActionKind::SessionStart {
            session_id,
            started_at,
        },
        ActionSource::Timer,
    )
}

/// `TIME_UPDATE{deltaMs}`.
pub fn time_update(delta_ms: i64) -> Action {
    Action::new(ActionKind::TimeUpdate { delta_ms }, ActionSource::Timer)
}

/// `TIMELINE_EVENTS_SET{events}`.
pub fn timeline_events_set(events: Vec<TimelineEvent>) -> Action {
    Action::new(ActionKind::TimelineEventsSet { events }, ActionSource::Timer)
}

// --- Persistence ---

/// `SAVE_GAME_START{kind}`.
pub fn save_game_start(kind: SaveKind) -> Action {
    Action::new(ActionKind::SaveGameStart { kind }, ActionSource::Persistence)
}

/// `SAVE_GAME_SUCCESS{kind, savedAt, sizeBytes}`.
pub fn save_game_success(kind: SaveKind, saved_at: i64, size_bytes: u64) -> Action {
    Action::new(
        ActionKind::SaveGameSuccess {
            kind,
            saved_at,
            size_bytes,
        },
        ActionSource::Persistence,
    )
}

/// `SAVE_GAME_FAILURE{kind, error}`.
pub fn save_game_failure(kind: SaveKind, error: impl Into<String>) -> Action {
    Action::new(
        ActionKind::SaveGameFailure {
            kind,
            error: error.into(),
        },
        ActionSource::Persistence,
    )
}

/// `LOAD_GAME_START`.
pub fn load_game_start() -> Action {
    Action::new(ActionKind::LoadGameStart, ActionSource::Persistence)
}

/// `LOAD_GAME_SUCCESS{schemaVersion, migrated, snapshot}`.
pub fn load_game_success(schema_version: u32, migrated: bool, snapshot: Snapshot) -> Action {
    Action::new(
        ActionKind::LoadGameSuccess {
            schema_version,
            migrated,
            snapshot: Box::new(snapshot),
        },
        ActionSource::Persistence,
    )
}

/// `LOAD_GAME_FAILURE{error}`.
pub fn load_game_failure(error: impl Into<String>) -> Action {
    Action::new(
        ActionKind::LoadGameFailure {
            error: error.into(),
        },
        ActionSource::Persistence,
    )
}

// --- Errors ---

/// `ERROR_OCCURRED{error}`.
pub fn error_occurred(error: ErrorRecord, source: ActionSource) -> Action {
    Action::new(ActionKind::ErrorOccurred { error }, source)
}

/// `ERROR_RECOVERED{trigger, fixes}`.
pub fn error_recovered(trigger: ActionType, fixes: Vec<String>) -> Action {
    Action::new(ActionKind::ErrorRecovered { trigger, fixes }, ActionSource::Engine)
}

// --- Lifecycle ---

/// `GAME_INITIALIZED`.
pub fn game_initialized() -> Action {
    Action::new(ActionKind::GameInitialized, ActionSource::Engine)
}

/// `GAME_PAUSED`.
pub fn game_paused() -> Action {
    Action::new(ActionKind::GamePaused, ActionSource::Input)
}

/// `GAME_RESUMED`.
pub fn game_resumed() -> Action {
    Action::new(ActionKind::GameResumed, ActionSource::Input)
}

/// `GAME_RESET{reason, preserveSettings}`.
pub fn game_reset(reason: impl Into<String>, preserve_settings: bool) -> Action {
    Action::new(
        ActionKind::GameReset {
            reason: reason.into(),
            preserve_settings,
        },
        ActionSource::Ui,
    )
}
