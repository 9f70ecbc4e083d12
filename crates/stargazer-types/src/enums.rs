//! Enumeration types shared by the snapshot, the action catalog, and the
//! error-reporting surface.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Action tags
// ---------------------------------------------------------------------------

/// Fieldless tag naming every action in the catalog.
///
/// Used for logging, timing statistics, and history inspection where the
/// payload is irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum ActionType {
    /// A level transition was requested.
    LevelTransitionStart,
    /// A level transition finished and the new level is active.
    LevelTransitionSuccess,
    /// A level transition failed and was rolled back.
    LevelTransitionFailure,
    /// The player completed a level.
    LevelCompleted,
    /// A star was selected.
    StarSelected,
    /// The current selection was cleared.
    StarDeselected,
    /// A star was discovered for the first time.
    StarDiscovered,
    /// Counters were overwritten.
    StatsUpdate,
    /// A single counter was incremented.
    StatsIncrement,
    /// A piece of content was unlocked.
    ContentUnlocked,
    /// An item was collected.
    ItemCollected,
    /// The player interacted with something in the scene.
    InteractionRecorded,
    /// Settings were partially updated.
    SettingsUpdate,
    /// Settings were restored to their defaults.
    SettingsReset,
    /// A new session began.
    SessionStart,
    /// Play time advanced.
    TimeUpdate,
    /// The timeline of scheduled sky events was replaced.
    TimelineEventsSet,
    /// A save was requested.
    SaveGameStart,
    /// A save completed.
    SaveGameSuccess,
    /// A save failed.
    SaveGameFailure,
    /// A load was requested.
    LoadGameStart,
    /// A load completed.
    LoadGameSuccess,
    /// A load failed.
    LoadGameFailure,
    /// An error was observed somewhere in the session.
    ErrorOccurred,
    /// Invalid state was automatically repaired.
    ErrorRecovered,
    /// The session finished bootstrapping.
    GameInitialized,
    /// The session was paused.
    GamePaused,
    /// The session was resumed.
    GameResumed,
    /// The session was reset to defaults.
    GameReset,
    /// An action whose tag is not part of the catalog.
    Unrecognized,
}

impl ActionType {
    /// Return the wire tag for this action type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LevelTransitionStart => "LEVEL_TRANSITION_START",
            Self::LevelTransitionSuccess => "LEVEL_TRANSITION_SUCCESS",
            Self::LevelTransitionFailure => "LEVEL_TRANSITION_FAILURE",
            Self::LevelCompleted => "LEVEL_COMPLETED",
            Self::StarSelected => "STAR_SELECTED",
            Self::StarDeselected => "STAR_DESELECTED",
            Self::StarDiscovered => "STAR_DISCOVERED",
            Self::StatsUpdate => "STATS_UPDATE",
            Self::StatsIncrement => "STATS_INCREMENT",
            Self::ContentUnlocked => "CONTENT_UNLOCKED",
            Self::ItemCollected => "ITEM_COLLECTED",
            Self::InteractionRecorded => "INTERACTION_RECORDED",
            Self::SettingsUpdate => "SETTINGS_UPDATE",
            Self::SettingsReset => "SETTINGS_RESET",
            Self::SessionStart => "SESSION_START",
            Self::TimeUpdate => "TIME_UPDATE",
            Self::TimelineEventsSet => "TIMELINE_EVENTS_SET",
            Self::SaveGameStart => "SAVE_GAME_START",
            Self::SaveGameSuccess => "SAVE_GAME_SUCCESS",
            Self::SaveGameFailure => "SAVE_GAME_FAILURE",
            Self::LoadGameStart => "LOAD_GAME_START",
            Self::LoadGameSuccess => "LOAD_GAME_SUCCESS",
            Self::LoadGameFailure => "LOAD_GAME_FAILURE",
            Self::ErrorOccurred => "ERROR_OCCURRED",
            Self::ErrorRecovered => "ERROR_RECOVERED",
            Self::GameInitialized => "GAME_INITIALIZED",
            Self::GamePaused => "GAME_PAUSED",
            Self::GameResumed => "GAME_RESUMED",
            Self::GameReset => "GAME_RESET",
            Self::Unrecognized => "UNRECOGNIZED",
        }
    }

    /// Whether this action records player progress (used to pace autosaves).
    pub const fn is_progress(self) -> bool {
        matches!(
            self,
            Self::LevelTransitionSuccess
                | Self::LevelCompleted
                | Self::StarDiscovered
                | Self::ContentUnlocked
                | Self::ItemCollected
                | Self::InteractionRecorded
        )
    }
}

impl core::fmt::Display for ActionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The producer that created an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionSource {
    /// A UI click handler or overlay control.
    Ui,
    /// A physics callback (collision, trigger volume).
    Physics,
    /// Keyboard, mouse, gamepad, or touch input.
    Input,
    /// A periodic timer (play-time ticks, autosave).
    Timer,
    /// The level transition orchestrator.
    Orchestrator,
    /// The persistence gateway.
    Persistence,
    /// The engine itself (follow-up error/recovery actions).
    Engine,
    /// A debugging tool.
    Debug,
}

// ---------------------------------------------------------------------------
// Payload enums
// ---------------------------------------------------------------------------

/// How the player selected a star.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SelectionMethod {
    /// Mouse click on the star.
    Click,
    /// Holding the reticle over the star.
    Gaze,
    /// Keyboard navigation.
    Keyboard,
    /// Tap on a touch screen.
    Touch,
    /// Selected by code (tour, deep link).
    Programmatic,
}

/// A numeric counter in the stats record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum StatField {
    /// Number of stars discovered.
    StarsDiscovered,
    /// Milliseconds spent exploring.
    TimeExploredMs,
    /// Number of recorded interactions.
    Interactions,
    /// Number of levels completed.
    LevelsCompleted,
    /// Number of items collected.
    ItemsCollected,
    /// Number of content pieces unlocked.
    ContentUnlocked,
}

impl StatField {
    /// All counters, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::StarsDiscovered,
        Self::TimeExploredMs,
        Self::Interactions,
        Self::LevelsCompleted,
        Self::ItemsCollected,
        Self::ContentUnlocked,
    ];

    /// The camelCase field name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StarsDiscovered => "starsDiscovered",
            Self::TimeExploredMs => "timeExploredMs",
            Self::Interactions => "interactions",
            Self::LevelsCompleted => "levelsCompleted",
            Self::ItemsCollected => "itemsCollected",
            Self::ContentUnlocked => "contentUnlocked",
        }
    }

    /// Parse a wire field name. Returns `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

/// Why a save was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SaveKind {
    /// The player asked for a save.
    Manual,
    /// The autosave trigger fired.
    Auto,
    /// A level transition or completion checkpoint.
    Checkpoint,
}

/// Rendering quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum GraphicsQuality {
    /// Reduced draw distance and no post-processing.
    Low,
    /// Balanced preset.
    #[default]
    Medium,
    /// Full draw distance and post-processing.
    High,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Severity band used when presenting an error to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ErrorSeverity {
    /// Minor issue; the player need not act.
    Low,
    /// Something was lost or skipped but the session is healthy.
    Medium,
    /// Progress may not be kept; the player should be told.
    High,
    /// Session state is inconsistent.
    Critical,
}

/// The component that reported an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ErrorComponent {
    /// The dispatcher.
    Engine,
    /// The snapshot validator.
    Validator,
    /// A middleware hook.
    Middleware,
    /// A subscriber callback.
    Subscriber,
    /// The persistence gateway.
    Persistence,
    /// The level transition orchestrator.
    LevelOrchestrator,
    /// A producer outside the engine (UI, input, physics).
    External,
}

impl ErrorComponent {
    /// The default severity band for errors from this component.
    pub const fn default_severity(self, recoverable: bool) -> ErrorSeverity {
        match (self, recoverable) {
            (Self::Validator | Self::Engine, false) => ErrorSeverity::Critical,
            (Self::Persistence, _) => ErrorSeverity::High,
            (Self::Validator | Self::Engine | Self::LevelOrchestrator, _) => ErrorSeverity::Medium,
            (Self::Middleware | Self::Subscriber | Self::External, _) => ErrorSeverity::Low,
        }
    }
}
