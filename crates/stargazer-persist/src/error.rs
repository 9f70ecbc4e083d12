//! Error types for the persistence layer.
//!
//! [`PersistError`] is what gateway callers see. It wraps the storage and
//! migration failures underneath with the save key or version involved.

/// Errors raised by a [`SaveStorage`](crate::storage::SaveStorage) backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A filesystem operation failed.
    #[error("storage I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The storage key cannot be used as a record name.
    #[error("invalid storage key: {key:?}")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },

    /// The backend refused the write.
    #[error("storage unavailable: {reason}")]
    Unavailable {
        /// Why the backend refused.
        reason: String,
    },
}

/// Errors raised while upgrading an old save record.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// The record's schema version is outside the supported range.
    #[error("unsupported schema version {found} (supported 1..={supported})")]
    UnsupportedVersion {
        /// Version found in the record.
        found: u32,
        /// Newest version this build understands.
        supported: u32,
    },

    /// The record does not have the shape a migration step expects.
    #[error("cannot migrate from version {from}: {reason}")]
    Malformed {
        /// Version the failing step starts from.
        from: u32,
        /// What was wrong.
        reason: String,
    },
}

/// Errors returned by the [`PersistenceGateway`](crate::gateway::PersistenceGateway).
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Another save or load holds the storage slot.
    #[error("storage busy: another save or load is in progress")]
    StorageBusy,

    /// No record exists under the key (first run).
    #[error("no saved game under key {key:?}")]
    NotFound {
        /// The storage key.
        key: String,
    },

    /// The record exists but could not be decoded.
    #[error("corrupt save record: {source}")]
    Corrupt {
        /// The decode error.
        source: serde_json::Error,
    },

    /// The snapshot could not be encoded.
    #[error("failed to encode snapshot: {source}")]
    Encode {
        /// The encode error.
        source: serde_json::Error,
    },

    /// Upgrading an old record failed.
    #[error("migration failed: {0}")]
    Migration(#[from] MigrationError),

    /// The storage backend failed.
    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl PersistError {
    /// Whether this is the ordinary "nothing saved yet" case.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
