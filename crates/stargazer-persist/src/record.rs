//! The on-disk save envelope.
//!
//! ```json
//! { "schemaVersion": 3, "savedAt": 1760000000000, "snapshot": { ... } }
//! ```
//!
//! The snapshot is kept as a raw JSON value so that old records can be
//! migrated before they are decoded into the current [`Snapshot`] shape.

use serde::{Deserialize, Serialize};
use stargazer_types::Snapshot;

use crate::error::PersistError;
use crate::migrate::CURRENT_SCHEMA_VERSION;

/// A versioned save record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    /// Schema version of `snapshot`.
    pub schema_version: u32,
    /// Epoch milliseconds at which the record was written.
    pub saved_at: i64,
    /// Serialized snapshot fields.
    pub snapshot: serde_json::Value,
}

impl SaveRecord {
    /// Wrap `snapshot` in a current-version record.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Encode`] if the snapshot cannot be
    /// serialized.
    pub fn capture(snapshot: &Snapshot, saved_at: i64) -> Result<Self, PersistError> {
        let snapshot =
            serde_json::to_value(snapshot).map_err(|source| PersistError::Encode { source })?;
        Ok(Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            saved_at,
            snapshot,
        })
    }

    /// Encode as JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Encode`] on serialization failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        serde_json::to_vec(self).map_err(|source| PersistError::Encode { source })
    }

    /// Decode from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Corrupt`] if the bytes are not a record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
        serde_json::from_slice(bytes).map_err(|source| PersistError::Corrupt { source })
    }
}
