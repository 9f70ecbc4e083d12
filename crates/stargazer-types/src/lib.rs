//! Shared type definitions for the Stargazer exploration engine.
//!
//! This crate is the single source of truth for the session snapshot and
//! the action catalog. Types flow to `TypeScript` via `ts-rs` for the UI
//! bindings that subscribe to the engine.
//!
//! # Modules
//!
//! - [`ids`] -- Newtype identifiers (stars, levels, content, items, sessions)
//! - [`enums`] -- Action tags, payload enums, error severity and components
//! - [`set`] -- Copy-on-write persistent identifier sets
//! - [`structs`] -- Records embedded in snapshots and payloads
//! - [`snapshot`] -- The immutable session snapshot
//! - [`actions`] -- Action envelope, payload catalog, JSON decoding
//! - [`creators`] -- Typed action creators

pub mod actions;
pub mod creators;
pub mod enums;
pub mod ids;
pub mod set;
pub mod snapshot;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use actions::{Action, ActionKind, ActionMeta, decode_action};
pub use enums::{
    ActionSource, ActionType, ErrorComponent, ErrorSeverity, GraphicsQuality, SaveKind,
    SelectionMethod, StatField,
};
pub use ids::{ContentId, ItemId, LevelId, SessionId, StarId};
pub use set::IdSet;
pub use snapshot::Snapshot;
pub use structs::{
    ErrorLog, ErrorRecord, Lifecycle, PendingTransition, PersistenceStatus, RecoveryRecord,
    SessionMeta, Settings, SettingsPatch, Star, Stats, StatsPatch, TimelineEvent,
};
