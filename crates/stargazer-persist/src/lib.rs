//! Save-game persistence for the Stargazer exploration engine.
//!
//! Saves are a single versioned JSON record under a fixed key. Loading an
//! older record runs the ordered schema migrations before decoding.
//!
//! # Modules
//!
//! - [`error`] -- [`PersistError`] and the storage/migration errors it wraps.
//! - [`storage`] -- [`SaveStorage`] trait, memory and file backends, and the
//!   single-slot storage lease.
//! - [`record`] -- The `{schemaVersion, savedAt, snapshot}` envelope.
//! - [`migrate`] -- Ordered schema migrations.
//! - [`gateway`] -- [`PersistenceGateway`]: save/load as action triads.
//!
//! [`PersistError`]: error::PersistError
//! [`SaveStorage`]: storage::SaveStorage
//! [`PersistenceGateway`]: gateway::PersistenceGateway

pub mod error;
pub mod gateway;
pub mod migrate;
pub mod record;
pub mod storage;

pub use error::{MigrationError, PersistError, StorageError};
pub use gateway::{LoadedGame, PersistenceGateway, SaveReceipt};
pub use migrate::CURRENT_SCHEMA_VERSION;
pub use record::SaveRecord;
pub use storage::{FileStorage, MemoryStorage, SaveStorage, StorageLease, StorageSlot};
