//! Record types embedded in the session snapshot and in action payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActionType, ErrorComponent, ErrorSeverity, GraphicsQuality, SaveKind, StatField};
use crate::ids::{LevelId, SessionId, StarId};

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// A selectable star or point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Star {
    /// Catalog identifier.
    pub id: StarId,
    /// Display name.
    pub name: String,
    /// Constellation the star belongs to, if any.
    #[serde(default)]
    pub constellation: Option<String>,
    /// Position on the sky dome in scene units.
    pub position: [f32; 3],
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Numeric progress counters.
///
/// Counters are signed so that a bad `STATS_UPDATE` can be observed and
/// clamped by the validator instead of wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct Stats {
    /// Number of stars discovered.
    pub stars_discovered: i64,
    /// Milliseconds spent exploring.
    pub time_explored_ms: i64,
    /// Number of recorded interactions.
    pub interactions: i64,
    /// Number of levels completed.
    pub levels_completed: i64,
    /// Number of items collected.
    pub items_collected: i64,
    /// Number of content pieces unlocked.
    pub content_unlocked: i64,
}

impl Stats {
    /// Read one counter.
    pub const fn get(&self, field: StatField) -> i64 {
        match field {
            StatField::StarsDiscovered => self.stars_discovered,
            StatField::TimeExploredMs => self.time_explored_ms,
            StatField::Interactions => self.interactions,
            StatField::LevelsCompleted => self.levels_completed,
            StatField::ItemsCollected => self.items_collected,
            StatField::ContentUnlocked => self.content_unlocked,
        }
    }

    /// Return a copy with one counter replaced.
    #[must_use]
    pub const fn with(mut self, field: StatField, value: i64) -> Self {
        match field {
            StatField::StarsDiscovered => self.stars_discovered = value,
            StatField::TimeExploredMs => self.time_explored_ms = value,
            StatField::Interactions => self.interactions = value,
            StatField::LevelsCompleted => self.levels_completed = value,
            StatField::ItemsCollected => self.items_collected = value,
            StatField::ContentUnlocked => self.content_unlocked = value,
        }
        self
    }

    /// Return a copy with one counter incremented by one, saturating.
    #[must_use]
    pub const fn bumped(self, field: StatField) -> Self {
        let next = self.get(field).saturating_add(1);
        self.with(field, next)
    }
}

/// Partial overwrite of the stats record. `None` leaves a counter alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct StatsPatch {
    /// New value for `starsDiscovered`.
    pub stars_discovered: Option<i64>,
    /// New value for `timeExploredMs`.
    pub time_explored_ms: Option<i64>,
    /// New value for `interactions`.
    pub interactions: Option<i64>,
    /// New value for `levelsCompleted`.
    pub levels_completed: Option<i64>,
    /// New value for `itemsCollected`.
    pub items_collected: Option<i64>,
    /// New value for `contentUnlocked`.
    pub content_unlocked: Option<i64>,
}

impl StatsPatch {
    /// Apply the patch, returning the patched record.
    #[must_use]
    pub fn apply(&self, stats: Stats) -> Stats {
        let entries = [
            (StatField::StarsDiscovered, self.stars_discovered),
            (StatField::TimeExploredMs, self.time_explored_ms),
            (StatField::Interactions, self.interactions),
            (StatField::LevelsCompleted, self.levels_completed),
            (StatField::ItemsCollected, self.items_collected),
            (StatField::ContentUnlocked, self.content_unlocked),
        ];
        entries
            .into_iter()
            .fold(stats, |acc, (field, value)| match value {
                Some(value) => acc.with(field, value),
                None => acc,
            })
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// User-configurable settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct Settings {
    /// Master volume in `0.0..=1.0`.
    pub master_volume: f32,
    /// Whether background music plays.
    pub music_enabled: bool,
    /// Mouse-look sensitivity multiplier.
    pub mouse_sensitivity: f32,
    /// Invert vertical mouse look.
    pub invert_y: bool,
    /// Vertical field of view in degrees.
    pub field_of_view: f32,
    /// Show contextual hints.
    pub show_hints: bool,
    /// Rendering quality preset.
    pub quality: GraphicsQuality,
    /// Whether autosave is enabled.
    pub autosave_enabled: bool,
}

impl Settings {
    /// Allowed master volume range.
    pub const VOLUME_RANGE: (f32, f32) = (0.0, 1.0);
    /// Allowed mouse sensitivity range.
    pub const SENSITIVITY_RANGE: (f32, f32) = (0.1, 5.0);
    /// Allowed field-of-view range in degrees.
    pub const FOV_RANGE: (f32, f32) = (30.0, 120.0);
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            master_volume: 0.8,
            music_enabled: true,
            mouse_sensitivity: 1.0,
            invert_y: false,
            field_of_view: 75.0,
            show_hints: true,
            quality: GraphicsQuality::Medium,
            autosave_enabled: true,
        }
    }
}

/// Partial settings update. `None` leaves a value alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct SettingsPatch {
    /// New master volume.
    pub master_volume: Option<f32>,
    /// New music toggle.
    pub music_enabled: Option<bool>,
    /// New mouse sensitivity.
    pub mouse_sensitivity: Option<f32>,
    /// New invert-Y toggle.
    pub invert_y: Option<bool>,
    /// New field of view.
    pub field_of_view: Option<f32>,
    /// New hints toggle.
    pub show_hints: Option<bool>,
    /// New quality preset.
    pub quality: Option<GraphicsQuality>,
    /// New autosave toggle.
    pub autosave_enabled: Option<bool>,
}

impl SettingsPatch {
    /// Whether the patch changes nothing.
    pub const fn is_empty(&self) -> bool {
        self.master_volume.is_none()
            && self.music_enabled.is_none()
            && self.mouse_sensitivity.is_none()
            && self.invert_y.is_none()
            && self.field_of_view.is_none()
            && self.show_hints.is_none()
            && self.quality.is_none()
            && self.autosave_enabled.is_none()
    }

    /// Apply the patch, returning the patched settings.
    #[must_use]
    pub fn apply(&self, settings: Settings) -> Settings {
        Settings {
            master_volume: self.master_volume.unwrap_or(settings.master_volume),
            music_enabled: self.music_enabled.unwrap_or(settings.music_enabled),
            mouse_sensitivity: self.mouse_sensitivity.unwrap_or(settings.mouse_sensitivity),
            invert_y: self.invert_y.unwrap_or(settings.invert_y),
            field_of_view: self.field_of_view.unwrap_or(settings.field_of_view),
            show_hints: self.show_hints.unwrap_or(settings.show_hints),
            quality: self.quality.unwrap_or(settings.quality),
            autosave_enabled: self.autosave_enabled.unwrap_or(settings.autosave_enabled),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Session identity and accumulated play time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SessionMeta {
    /// Identifier of the current session.
    pub session_id: SessionId,
    /// When the current session started.
    pub started_at: DateTime<Utc>,
    /// Play time accumulated across all sessions, in milliseconds.
    pub play_time_ms: i64,
    /// The level a reset returns to.
    pub home_level: LevelId,
}

/// Coarse lifecycle flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct Lifecycle {
    /// `GAME_INITIALIZED` has been dispatched.
    pub initialized: bool,
    /// The session is paused.
    pub paused: bool,
}

/// A level transition between `START` and `SUCCESS`/`FAILURE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PendingTransition {
    /// Level being left.
    pub from: LevelId,
    /// Level being entered.
    pub to: LevelId,
    /// When the transition was requested.
    pub started_at: DateTime<Utc>,
}

/// A scheduled sky event shown on the session timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TimelineEvent {
    /// Event identifier.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Offset from session start, in milliseconds.
    pub at_ms: i64,
    /// Star the event highlights, if any.
    #[serde(default)]
    pub star: Option<StarId>,
}

// ---------------------------------------------------------------------------
// Persistence status
// ---------------------------------------------------------------------------

/// Save/load progress as seen by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct PersistenceStatus {
    /// A save is in flight.
    pub saving: bool,
    /// A load is in flight.
    pub loading: bool,
    /// Epoch milliseconds of the last successful save.
    pub last_saved_at: Option<i64>,
    /// Kind of the last successful save.
    pub last_save_kind: Option<SaveKind>,
    /// A save failed; the session keeps running without local persistence.
    pub memory_only: bool,
    /// Message of the most recent save or load failure.
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An error surfaced through `ERROR_OCCURRED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ErrorRecord {
    /// Internal error text (logged, never shown to the player verbatim).
    pub error: String,
    /// Reporting component.
    pub component: ErrorComponent,
    /// Additional context for debugging.
    #[serde(default)]
    pub detail: Option<String>,
    /// Severity band.
    pub severity: ErrorSeverity,
    /// Whether the session can keep going unaided.
    pub recoverable: bool,
    /// The operation that failed, when the component runs more than one.
    #[serde(default)]
    pub operation: Option<ActionType>,
}

impl ErrorRecord {
    /// Build a record using the component's default severity band.
    pub fn new(component: ErrorComponent, error: impl Into<String>, recoverable: bool) -> Self {
        Self {
            error: error.into(),
            component,
            detail: None,
            severity: component.default_severity(recoverable),
            recoverable,
            operation: None,
        }
    }

    /// Attach debugging detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Name the operation that failed.
    #[must_use]
    pub const fn with_operation(mut self, operation: ActionType) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Override the severity band.
    #[must_use]
    pub const fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// A validator auto-fix surfaced through `ERROR_RECOVERED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RecoveryRecord {
    /// The action whose result needed repair.
    pub trigger: String,
    /// Human-readable description of each repair.
    pub fixes: Vec<String>,
    /// When the repair happened.
    pub at: DateTime<Utc>,
}

/// Error bookkeeping kept in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct ErrorLog {
    /// Most recent error.
    pub last: Option<ErrorRecord>,
    /// Number of `ERROR_OCCURRED` actions reduced.
    pub occurred: u64,
    /// Number of `ERROR_RECOVERED` actions reduced.
    pub recovered: u64,
    /// Most recent automatic repair.
    pub last_recovery: Option<RecoveryRecord>,
}
