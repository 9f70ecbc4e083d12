//! Bounded dispatch history for debugging and replay.
//!
//! The history keeps the most recent `capacity` dispatched actions (after
//! middleware rewriting) together with a digest of the snapshot each one
//! produced. The oldest entry is evicted once the buffer is full.

use std::collections::VecDeque;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use stargazer_types::{Action, Snapshot};

/// Cheap fingerprint of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDigest {
    /// When the digest was taken.
    pub at: DateTime<Utc>,
    /// Hash of the snapshot's JSON form.
    pub hash: u64,
}

impl SnapshotDigest {
    /// Fingerprint `snapshot`.
    pub fn of(snapshot: &Snapshot) -> Self {
        Self {
            at: Utc::now(),
            hash: digest_hash(snapshot),
        }
    }

    /// Whether `snapshot` hashes to this digest.
    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        self.hash == digest_hash(snapshot)
    }
}

fn digest_hash(snapshot: &Snapshot) -> u64 {
    let bytes = serde_json::to_vec(snapshot).unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// One dispatched action and the snapshot it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionHistoryEntry {
    /// Position in the engine's total dispatch order, starting at 1.
    pub sequence: u64,
    /// The action as reduced.
    pub action: Action,
    /// Digest of the resulting snapshot.
    pub digest: SnapshotDigest,
}

/// Fixed-capacity ring buffer of [`ActionHistoryEntry`].
#[derive(Debug, Clone)]
pub struct ActionHistory {
    capacity: usize,
    entries: VecDeque<ActionHistoryEntry>,
    evicted: u64,
    origin: Arc<Snapshot>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryExport<'a> {
    capacity: usize,
    evicted: u64,
    entries: &'a VecDeque<ActionHistoryEntry>,
}

impl ActionHistory {
    /// Create an empty history starting from `origin`. A zero capacity is
    /// raised to 1.
    pub fn new(capacity: usize, origin: Arc<Snapshot>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            evicted: 0,
            origin,
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: ActionHistoryEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.evicted = self.evicted.saturating_add(1);
        }
        self.entries.push_back(entry);
    }

    /// Maximum number of retained entries.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries dropped to stay within capacity.
    pub const fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Whether every entry since the origin is still retained.
    pub const fn is_complete(&self) -> bool {
        self.evicted == 0
    }

    /// The snapshot the history started from.
    pub const fn origin(&self) -> &Arc<Snapshot> {
        &self.origin
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &ActionHistoryEntry> {
        self.entries.iter()
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<&ActionHistoryEntry> {
        self.entries.back()
    }

    /// Export as pretty JSON for debug tooling.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&HistoryExport {
            capacity: self.capacity,
            evicted: self.evicted,
            entries: &self.entries,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use stargazer_types::{LevelId, creators};

    use super::*;

    fn entry(sequence: u64, snapshot: &Snapshot) -> ActionHistoryEntry {
        ActionHistoryEntry {
            sequence,
            action: creators::time_update(1),
            digest: SnapshotDigest::of(snapshot),
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let origin = Arc::new(Snapshot::fresh(LevelId::new("observatory")));
        let mut history = ActionHistory::new(3, Arc::clone(&origin));
        for sequence in 1..=5 {
            history.push(entry(sequence, &origin));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.evicted(), 2);
        assert!(!history.is_complete());
        let kept: Vec<u64> = history.entries().map(|e| e.sequence).collect();
        assert_eq!(kept, vec![3, 4, 5]);
    }

    #[test]
    fn digest_tracks_content() {
        let snapshot = Snapshot::fresh(LevelId::new("observatory"));
        let digest = SnapshotDigest::of(&snapshot);
        assert!(digest.matches(&snapshot));
        let mut changed = snapshot;
        changed.stats.interactions = 1;
        assert!(!digest.matches(&changed));
    }

    #[test]
    fn json_export_lists_entries() {
        let origin = Arc::new(Snapshot::fresh(LevelId::new("observatory")));
        let mut history = ActionHistory::new(10, Arc::clone(&origin));
        history.push(entry(1, &origin));
        let value: serde_json::Value = serde_json::from_str(&history.to_json().unwrap()).unwrap();
        assert_eq!(value["capacity"], 10);
        assert_eq!(value["entries"][0]["action"]["type"], "TIME_UPDATE");
    }
}
