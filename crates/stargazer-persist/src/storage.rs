//! Storage backends for save records and the single-slot storage lease.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::StorageError;

/// A key-value store for encoded save records.
pub trait SaveStorage: Send + Sync {
    /// Read the record under `key`, or `None` if there is none.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send;

    /// Replace the record under `key`.
    fn write(&self, key: &str, bytes: Vec<u8>)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete the record under `key`. Returns whether one existed.
    fn remove(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Volatile storage, used in tests and when no save directory is usable.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<BTreeMap<String, Vec<u8>>>,
    reject_writes: AtomicBool,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::Release);
    }

    /// Store raw bytes, bypassing encoding.
    pub fn insert_raw(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), bytes.into());
    }

    /// Copy of the raw bytes under `key`.
    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl SaveStorage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.get_raw(key))
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        if self.reject_writes.load(Ordering::Acquire) {
            return Err(StorageError::Unavailable {
                reason: "writes rejected".to_owned(),
            });
        }
        self.insert_raw(key, bytes);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some())
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// One file per key inside a directory.
///
/// Writes go to a sibling `.tmp` file that is renamed over the target, so a
/// crash mid-write never leaves a truncated record behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Store records under `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let usable = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if usable {
            Ok(self.dir.join(key))
        } else {
            Err(StorageError::InvalidKey {
                key: key.to_owned(),
            })
        }
    }
}

impl SaveStorage for FileStorage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let staging = self.dir.join(format!("{key}.tmp"));
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Save record written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage lease
// ---------------------------------------------------------------------------

/// Admits one save or load at a time.
#[derive(Debug, Clone, Default)]
pub struct StorageSlot {
    held: Arc<AtomicBool>,
}

impl StorageSlot {
    /// Create a free slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot, or `None` if it is already held.
    pub fn try_acquire(&self) -> Option<StorageLease> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| StorageLease {
                held: Arc::clone(&self.held),
            })
    }

    /// Whether a lease is outstanding.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Holds the [`StorageSlot`]; released on drop, on every exit path.
#[derive(Debug)]
pub struct StorageLease {
    held: Arc<AtomicBool>,
}

impl Drop for StorageLease {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
