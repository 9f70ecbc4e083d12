//! The persistence gateway: save and load as dispatched action triads.
//!
//! The gateway never touches the snapshot directly. A save dispatches
//! `SAVE_GAME_START`, writes the record, then dispatches
//! `SAVE_GAME_SUCCESS` or `SAVE_GAME_FAILURE`. Loads work the same way
//! with the `LOAD_GAME_*` actions. Every operation holds the storage lease
//! for its whole duration; a concurrent request fails with
//! [`PersistError::StorageBusy`] instead of queueing.
//!
//! Producers may also dispatch a `*_START` action directly. The engine
//! relays it as a request, and [`PersistenceGateway::serve_requests`]
//! finishes the job.

use std::sync::Arc;

use chrono::Utc;
use stargazer_core::Engine;
use stargazer_core::config::PersistenceConfig;
use stargazer_core::middleware::PersistRequest;
use stargazer_core::reducer::reduce;
use stargazer_types::{
    Action, ActionSource, ActionType, ErrorComponent, ErrorRecord, ErrorSeverity, SaveKind,
    Snapshot, creators,
};
use tracing::{debug, info, warn};

use crate::error::PersistError;
use crate::migrate::migrate;
use crate::record::SaveRecord;
use crate::storage::{SaveStorage, StorageSlot};

/// What a successful save wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReceipt {
    /// Manual, auto, or checkpoint.
    pub kind: SaveKind,
    /// Epoch milliseconds stamped into the record.
    pub saved_at: i64,
    /// Encoded record size.
    pub size_bytes: u64,
}

/// A decoded, migrated save.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedGame {
    /// The snapshot, in the current schema.
    pub snapshot: Snapshot,
    /// Schema version the record was written with.
    pub schema_version: u32,
    /// Whether migrations ran.
    pub migrated: bool,
    /// Epoch milliseconds at which the record was written.
    pub saved_at: i64,
}

/// Saves and loads the engine's snapshot through a [`SaveStorage`].
#[derive(Debug)]
pub struct PersistenceGateway<S> {
    engine: Arc<Engine>,
    storage: S,
    key: String,
    slot: StorageSlot,
}

impl<S: SaveStorage> PersistenceGateway<S> {
    /// Create a gateway using the configured storage key.
    pub fn new(engine: Arc<Engine>, storage: S, config: &PersistenceConfig) -> Self {
        Self {
            engine,
            storage,
            key: config.storage_key.clone(),
            slot: StorageSlot::new(),
        }
    }

    /// The storage backend.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// The key records are stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a save or load is in progress.
    pub fn is_busy(&self) -> bool {
        self.slot.is_held()
    }

    /// Save the current snapshot.
    ///
    /// On failure the session degrades to memory-only: the engine sees
    /// `SAVE_GAME_FAILURE` followed by a high-severity `ERROR_OCCURRED`.
    pub async fn save(&self, kind: SaveKind) -> Result<SaveReceipt, PersistError> {
        let Some(_lease) = self.slot.try_acquire() else {
            warn!(kind = ?kind, "Save rejected, storage busy");
            return Err(PersistError::StorageBusy);
        };

        self.emit(creators::save_game_start(kind));
        self.complete_save(kind).await
    }

    /// Run an autosave if the autosave middleware has asked for one.
    ///
    /// Returns `None` when no autosave was pending or the session is
    /// memory-only.
    pub async fn autosave_if_requested(&self) -> Option<Result<SaveReceipt, PersistError>> {
        if !self.engine.autosave_signal().take() {
            return None;
        }
        if self.engine.state().persistence.memory_only {
            debug!("Autosave skipped, session is memory-only");
            return None;
        }
        Some(self.save(SaveKind::Auto).await)
    }

    /// Load the saved game into the engine.
    ///
    /// A missing record is the normal first-run case: the engine sees
    /// `LOAD_GAME_FAILURE` only. Corrupt or unmigratable records also
    /// raise `ERROR_OCCURRED`. Either way the caller keeps the snapshot it
    /// already has.
    pub async fn load(&self) -> Result<LoadedGame, PersistError> {
        let Some(_lease) = self.slot.try_acquire() else {
            warn!("Load rejected, storage busy");
            return Err(PersistError::StorageBusy);
        };

        self.emit(creators::load_game_start());
        self.complete_load().await
    }

    /// Complete the save and load requests that producers started by
    /// dispatching `SAVE_GAME_START` or `LOAD_GAME_START` themselves.
    ///
    /// The start is already in the engine, so only the outcome is
    /// dispatched. While the storage is busy the remaining requests stay
    /// queued for the next call. Returns how many requests were completed.
    pub async fn serve_requests(&self) -> usize {
        let requests = self.engine.persist_requests();
        let mut served = 0_usize;
        while let Some(request) = requests.pop() {
            let Some(_lease) = self.slot.try_acquire() else {
                debug!(request = ?request, "Storage busy, request left queued");
                requests.requeue(request);
                break;
            };
            let completed = match request {
                PersistRequest::Save(kind) => self.complete_save(kind).await.is_ok(),
                PersistRequest::Load => self.complete_load().await.is_ok(),
            };
            debug!(request = ?request, completed, "Persistence request served");
            served = served.saturating_add(1);
        }
        served
    }

    /// Read and migrate the saved game without dispatching anything.
    pub async fn peek(&self) -> Result<LoadedGame, PersistError> {
        let Some(_lease) = self.slot.try_acquire() else {
            return Err(PersistError::StorageBusy);
        };
        self.read_saved().await
    }

    /// Delete the saved game. Returns whether one existed.
    pub async fn clear(&self) -> Result<bool, PersistError> {
        let Some(_lease) = self.slot.try_acquire() else {
            return Err(PersistError::StorageBusy);
        };
        Ok(self.storage.remove(&self.key).await?)
    }

    async fn complete_save(&self, kind: SaveKind) -> Result<SaveReceipt, PersistError> {
        match self.write_current(kind).await {
            Ok(receipt) => {
                info!(
                    kind = ?kind,
                    key = %self.key,
                    size_bytes = receipt.size_bytes,
                    "Game saved"
                );
                self.emit(creators::save_game_success(
                    kind,
                    receipt.saved_at,
                    receipt.size_bytes,
                ));
                Ok(receipt)
            }
            Err(error) => {
                warn!(kind = ?kind, error = %error, "Save failed, continuing memory-only");
                self.emit(creators::save_game_failure(kind, error.to_string()));
                self.emit(failure_report(
                    "failed to save game",
                    ActionType::SaveGameStart,
                    &error,
                ));
                Err(error)
            }
        }
    }

    async fn complete_load(&self) -> Result<LoadedGame, PersistError> {
        match self.read_saved().await {
            Ok(loaded) => {
                info!(
                    key = %self.key,
                    schema_version = loaded.schema_version,
                    migrated = loaded.migrated,
                    "Game loaded"
                );
                self.emit(creators::load_game_success(
                    loaded.schema_version,
                    loaded.migrated,
                    loaded.snapshot.clone(),
                ));
                Ok(loaded)
            }
            Err(error) => {
                self.emit(creators::load_game_failure(error.to_string()));
                if error.is_not_found() {
                    info!(key = %self.key, "No saved game, starting fresh");
                } else {
                    warn!(key = %self.key, error = %error, "Saved game unusable, starting fresh");
                    self.emit(failure_report(
                        "failed to load saved game",
                        ActionType::LoadGameStart,
                        &error,
                    ));
                }
                Err(error)
            }
        }
    }

    /// Write the snapshot as it will stand once `SAVE_GAME_SUCCESS` is
    /// reduced, so a later load restores a settled save status.
    async fn write_current(&self, kind: SaveKind) -> Result<SaveReceipt, PersistError> {
        let saved_at = Utc::now().timestamp_millis();
        let settled = reduce(
            &self.engine.state(),
            &creators::save_game_success(kind, saved_at, 0),
        );
        let bytes = SaveRecord::capture(&settled, saved_at)?.to_bytes()?;
        let size_bytes = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        self.storage.write(&self.key, bytes).await?;
        Ok(SaveReceipt {
            kind,
            saved_at,
            size_bytes,
        })
    }

    async fn read_saved(&self) -> Result<LoadedGame, PersistError> {
        let Some(bytes) = self.storage.read(&self.key).await? else {
            return Err(PersistError::NotFound {
                key: self.key.clone(),
            });
        };
        let record = SaveRecord::from_bytes(&bytes)?;
        let upgraded = migrate(record.schema_version, record.snapshot)?;
        let snapshot: Snapshot = serde_json::from_value(upgraded.snapshot)
            .map_err(|source| PersistError::Corrupt { source })?;
        Ok(LoadedGame {
            snapshot,
            schema_version: upgraded.from_version,
            migrated: upgraded.migrated,
            saved_at: record.saved_at,
        })
    }

    fn emit(&self, action: Action) {
        if let Err(error) = self.engine.dispatch(action) {
            warn!(error = %error, "Persistence outcome could not be dispatched");
        }
    }
}

/// Save failures risk progress; a failed load only costs the old save.
fn failure_report(summary: &str, operation: ActionType, error: &PersistError) -> Action {
    let mut record = ErrorRecord::new(ErrorComponent::Persistence, summary, true)
        .with_operation(operation)
        .with_detail(error.to_string());
    if operation == ActionType::LoadGameStart {
        record = record.with_severity(ErrorSeverity::Medium);
    }
    creators::error_occurred(record, ActionSource::Persistence)
}
