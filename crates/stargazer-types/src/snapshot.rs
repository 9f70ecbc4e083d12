//! The session snapshot: the complete, immutable session state at one
//! instant.
//!
//! A snapshot is never mutated after it has been published by the engine.
//! Every transition builds a new value; set-valued fields share storage
//! with their predecessor through [`IdSet`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{ContentId, ItemId, LevelId, SessionId, StarId};
use crate::set::IdSet;
use crate::structs::{
    ErrorLog, Lifecycle, PendingTransition, PersistenceStatus, SessionMeta, Settings, Star, Stats,
    TimelineEvent,
};

/// Complete session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    /// The active level. Always a registered level id.
    pub current_level: LevelId,
    /// The level active before the last successful transition.
    #[serde(default)]
    pub previous_level: Option<LevelId>,
    /// The selected star, only while the current level supports selection.
    #[serde(default)]
    pub selected_star: Option<Star>,
    /// Stars discovered so far.
    #[serde(default)]
    #[ts(type = "Array<StarId>")]
    pub discovered_stars: IdSet<StarId>,
    /// Levels completed so far.
    #[serde(default)]
    #[ts(type = "Array<LevelId>")]
    pub completed_levels: IdSet<LevelId>,
    /// Levels left at least once through a successful transition.
    #[serde(default)]
    #[ts(type = "Array<LevelId>")]
    pub visited_levels: IdSet<LevelId>,
    /// Content unlocked so far.
    #[serde(default)]
    #[ts(type = "Array<ContentId>")]
    pub unlocked_content: IdSet<ContentId>,
    /// Items collected so far.
    #[serde(default)]
    #[ts(type = "Array<ItemId>")]
    pub collected_items: IdSet<ItemId>,
    /// Progress counters.
    #[serde(default)]
    pub stats: Stats,
    /// User settings.
    #[serde(default)]
    pub settings: Settings,
    /// Session identity and play time.
    pub session: SessionMeta,
    /// Lifecycle flags.
    #[serde(default)]
    pub lifecycle: Lifecycle,
    /// In-flight level transition, if any.
    #[serde(default)]
    pub transition: Option<PendingTransition>,
    /// Save/load status.
    #[serde(default)]
    pub persistence: PersistenceStatus,
    /// Error bookkeeping.
    #[serde(default)]
    pub errors: ErrorLog,
    /// Scheduled sky events.
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
}

impl Snapshot {
    /// Build the default snapshot for a fresh session starting on `home_level`.
    pub fn initial(session_id: SessionId, home_level: LevelId, started_at: DateTime<Utc>) -> Self {
        Self {
            current_level: home_level.clone(),
            previous_level: None,
            selected_star: None,
            discovered_stars: IdSet::new(),
            completed_levels: IdSet::new(),
            visited_levels: IdSet::new(),
            unlocked_content: IdSet::new(),
            collected_items: IdSet::new(),
            stats: Stats::default(),
            settings: Settings::default(),
            session: SessionMeta {
                session_id,
                started_at,
                play_time_ms: 0,
                home_level,
            },
            lifecycle: Lifecycle::default(),
            transition: None,
            persistence: PersistenceStatus::default(),
            errors: ErrorLog::default(),
            timeline: Vec::new(),
        }
    }

    /// Shorthand for a fresh session with a new id, started now.
    pub fn fresh(home_level: LevelId) -> Self {
        Self::initial(SessionId::new(), home_level, Utc::now())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn initial_snapshot_starts_at_home() {
        let snapshot = Snapshot::fresh(LevelId::new("observatory"));
        assert_eq!(snapshot.current_level, LevelId::new("observatory"));
        assert_eq!(snapshot.session.home_level, LevelId::new("observatory"));
        assert!(snapshot.previous_level.is_none());
        assert_eq!(snapshot.stats.stars_discovered, 0);
        assert!(snapshot.discovered_stars.is_empty());
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let snapshot = Snapshot::fresh(LevelId::new("observatory"));
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("currentLevel").is_some());
        assert!(value.get("discoveredStars").is_some());
        assert!(value["stats"].get("starsDiscovered").is_some());
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let mut snapshot = Snapshot::fresh(LevelId::new("observatory"));
        snapshot.discovered_stars = [StarId::new("vega")].into_iter().collect();
        snapshot.settings.master_volume = 0.35;
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
