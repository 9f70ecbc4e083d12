//! The action model: a closed, tagged catalog of state-change intents.
//!
//! Every action is an [`ActionKind`] (type tag plus typed payload) and an
//! [`ActionMeta`] envelope. Producers build actions through the functions
//! in [`crate::creators`]; the engine owns an action from the moment it is
//! dispatched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActionSource, ActionType, SaveKind, SelectionMethod, StatField};
use crate::ids::{ContentId, ItemId, LevelId, SessionId, StarId};
use crate::snapshot::Snapshot;
use crate::structs::{ErrorRecord, SettingsPatch, Star, StatsPatch, TimelineEvent};

/// Envelope metadata attached to every action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ActionMeta {
    /// When the producer created the action.
    pub timestamp: DateTime<Utc>,
    /// Which producer created the action.
    pub source: ActionSource,
    /// Dispatch sequence number, stamped by middleware.
    #[serde(default)]
    pub sequence: Option<u64>,
    /// Free-form tags added by producers or middleware.
    #[serde(default)]
    pub context: Option<BTreeMap<String, String>>,
}

impl ActionMeta {
    /// Metadata stamped with the current time.
    pub fn now(source: ActionSource) -> Self {
        Self {
            timestamp: Utc::now(),
            source,
            sequence: None,
            context: None,
        }
    }

    /// Look up a context tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.context
            .as_ref()
            .and_then(|context| context.get(key))
            .map(String::as_str)
    }
}

/// Action payloads, one variant per action type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum ActionKind {
    // --- Level lifecycle ---
    /// A level transition was requested.
    LevelTransitionStart {
        /// Level being left.
        from: LevelId,
        /// Level being entered.
        to: LevelId,
    },
    /// A level transition finished.
    #[serde(rename_all = "camelCase")]
    LevelTransitionSuccess {
        /// Level that was left.
        from: LevelId,
        /// Level now active.
        to: LevelId,
        /// Wall-clock duration of the transition.
        duration_ms: u64,
    },
    /// A level transition failed; the previous level stays active.
    LevelTransitionFailure {
        /// Level that should have been left.
        from: LevelId,
        /// Level that failed to load.
        to: LevelId,
        /// Failure description.
        error: String,
    },
    /// The player completed a level.
    LevelCompleted {
        /// The completed level.
        level: LevelId,
    },

    // --- Selection ---
    /// A star was selected.
    StarSelected {
        /// The selected star.
        star: Star,
        /// How it was selected.
        method: SelectionMethod,
    },
    /// The selection was cleared.
    StarDeselected,
    /// A star was discovered.
    StarDiscovered {
        /// The discovered star.
        star: StarId,
    },

    // --- Progress ---
    /// Overwrite counters.
    StatsUpdate {
        /// Counters to overwrite.
        updates: StatsPatch,
    },
    /// Add to a single counter.
    StatsIncrement {
        /// Counter to change.
        field: StatField,
        /// Amount to add (may be negative; the result is clamped at zero).
        /// Defaults to one when the producer omits it.
        #[serde(default = "one")]
        amount: i64,
    },
    /// A piece of content was unlocked.
    ContentUnlocked {
        /// The unlocked content.
        content: ContentId,
    },
    /// An item was collected.
    ItemCollected {
        /// The collected item.
        item: ItemId,
    },
    /// The player interacted with a scene object.
    InteractionRecorded {
        /// What was interacted with.
        target: String,
    },

    // --- Settings ---
    /// Partially update settings.
    SettingsUpdate {
        /// Values to change.
        updates: SettingsPatch,
    },
    /// Restore default settings.
    SettingsReset,

    // --- Session ---
    /// A new session began.
    #[serde(rename_all = "camelCase")]
    SessionStart {
        /// Identifier of the new session.
        session_id: SessionId,
        /// When the session began.
        started_at: DateTime<Utc>,
    },
    /// Play time advanced.
    #[serde(rename_all = "camelCase")]
    TimeUpdate {
        /// Milliseconds elapsed since the previous update.
        delta_ms: i64,
    },
    /// Replace the timeline of scheduled sky events.
    TimelineEventsSet {
        /// The new timeline.
        events: Vec<TimelineEvent>,
    },

    // --- Persistence ---
    /// A save was requested.
    SaveGameStart {
        /// Why the save was requested.
        kind: SaveKind,
    },
    /// A save completed.
    #[serde(rename_all = "camelCase")]
    SaveGameSuccess {
        /// Why the save was requested.
        kind: SaveKind,
        /// Epoch milliseconds of the write.
        saved_at: i64,
        /// Size of the stored record.
        size_bytes: u64,
    },
    /// A save failed.
    SaveGameFailure {
        /// Why the save was requested.
        kind: SaveKind,
        /// Failure description.
        error: String,
    },
    /// A load was requested.
    LoadGameStart,
    /// A load completed; the loaded snapshot replaces the session state.
    #[serde(rename_all = "camelCase")]
    LoadGameSuccess {
        /// Schema version found in storage, before migration.
        schema_version: u32,
        /// Whether migrations were applied.
        migrated: bool,
        /// The decoded snapshot.
        snapshot: Box<Snapshot>,
    },
    /// A load failed; the session keeps its current state.
    LoadGameFailure {
        /// Failure description.
        error: String,
    },

    // --- Errors ---
    /// An error was observed.
    ErrorOccurred {
        /// The error.
        error: ErrorRecord,
    },
    /// Invalid state was repaired automatically.
    ErrorRecovered {
        /// The action whose result needed repair.
        trigger: ActionType,
        /// Description of each repair.
        fixes: Vec<String>,
    },

    // --- Lifecycle ---
    /// Bootstrapping finished.
    GameInitialized,
    /// The session was paused.
    GamePaused,
    /// The session was resumed.
    GameResumed,
    /// Reset the session to defaults.
    #[serde(rename_all = "camelCase")]
    GameReset {
        /// Why the reset happened.
        reason: String,
        /// Keep the current settings across the reset.
        preserve_settings: bool,
    },

    /// An action whose tag is not in the catalog. Reduces to a no-op.
    Unrecognized {
        /// The unknown tag.
        tag: String,
    },
}

impl ActionKind {
    /// The fieldless tag for this payload.
    pub const fn action_type(&self) -> ActionType {
        match self {
            Self::LevelTransitionStart { .. } => ActionType::LevelTransitionStart,
            Self::LevelTransitionSuccess { .. } => ActionType::LevelTransitionSuccess,
            Self::LevelTransitionFailure { .. } => ActionType::LevelTransitionFailure,
            Self::LevelCompleted { .. } => ActionType::LevelCompleted,
            Self::StarSelected { .. } => ActionType::StarSelected,
            Self::StarDeselected => ActionType::StarDeselected,
            Self::StarDiscovered { .. } => ActionType::StarDiscovered,
            Self::StatsUpdate { .. } => ActionType::StatsUpdate,
            Self::StatsIncrement { .. } => ActionType::StatsIncrement,
            Self::ContentUnlocked { .. } => ActionType::ContentUnlocked,
            Self::ItemCollected { .. } => ActionType::ItemCollected,
            Self::InteractionRecorded { .. } => ActionType::InteractionRecorded,
            Self::SettingsUpdate { .. } => ActionType::SettingsUpdate,
            Self::SettingsReset => ActionType::SettingsReset,
            Self::SessionStart { .. } => ActionType::SessionStart,
            Self::TimeUpdate { .. } => ActionType::TimeUpdate,
            Self::TimelineEventsSet { .. } => ActionType::TimelineEventsSet,
            Self::SaveGameStart { .. } => ActionType::SaveGameStart,
            Self::SaveGameSuccess { .. } => ActionType::SaveGameSuccess,
            Self::SaveGameFailure { .. } => ActionType::SaveGameFailure,
            Self::LoadGameStart => ActionType::LoadGameStart,
            Self::LoadGameSuccess { .. } => ActionType::LoadGameSuccess,
            Self::LoadGameFailure { .. } => ActionType::LoadGameFailure,
            Self::ErrorOccurred { .. } => ActionType::ErrorOccurred,
            Self::ErrorRecovered { .. } => ActionType::ErrorRecovered,
            Self::GameInitialized => ActionType::GameInitialized,
            Self::GamePaused => ActionType::GamePaused,
            Self::GameResumed => ActionType::GameResumed,
            Self::GameReset { .. } => ActionType::GameReset,
            Self::Unrecognized { .. } => ActionType::Unrecognized,
        }
    }
}

/// A dispatched intent: payload plus envelope.
///
/// On the wire the payload's `type`/`payload` keys sit beside `meta`, so
/// the UI-side binding is `ActionKind & { meta: ActionMeta }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Tag and payload.
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Envelope metadata.
    pub meta: ActionMeta,
}

impl Action {
    /// Wrap a payload with fresh metadata.
    pub fn new(kind: ActionKind, source: ActionSource) -> Self {
        Self {
            kind,
            meta: ActionMeta::now(source),
        }
    }

    /// The fieldless tag for this action.
    pub const fn action_type(&self) -> ActionType {
        self.kind.action_type()
    }

    /// Return the action attributed to a different producer.
    #[must_use]
    pub const fn with_source(mut self, source: ActionSource) -> Self {
        self.meta.source = source;
        self
    }

    /// Return the action with an added context tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta
            .context
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

const fn one() -> i64 {
    1
}

/// Decode an action from UI-bridge JSON.
///
/// Input that is not an object, lacks `meta`, or names an unknown `type`
/// (or carries a payload that does not match its type) becomes an
/// [`ActionKind::Unrecognized`] action attributed to `fallback_source`,
/// which the reducer treats as a no-op. Payload-less actions are accepted
/// with or without an empty `"payload": {}`.
pub fn decode_action(value: serde_json::Value, fallback_source: ActionSource) -> Action {
    let tag = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let without_payload = empty_payload_removed(&value);
    serde_json::from_value::<Action>(value)
        .or_else(|error| without_payload.map_or(Err(error), serde_json::from_value))
        .unwrap_or_else(|_| Action::new(ActionKind::Unrecognized { tag }, fallback_source))
}

/// A copy of `value` with its `payload` key dropped, if that payload is `{}`.
fn empty_payload_removed(value: &serde_json::Value) -> Option<serde_json::Value> {
    let object = value.as_object()?;
    object
        .get("payload")?
        .as_object()
        .filter(|payload| payload.is_empty())?;
    let mut stripped = object.clone();
    stripped.remove("payload");
    Some(serde_json::Value::Object(stripped))
}
