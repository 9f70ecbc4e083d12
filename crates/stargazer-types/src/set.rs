//! Persistent, copy-on-write identifier sets.
//!
//! Snapshots are cloned on every state transition, so set-valued fields
//! share their storage behind an [`Arc`]. Mutating operations return a new
//! set only when membership actually changes, which lets the reducer hand
//! back the previous snapshot by reference for no-op actions.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// An immutable ordered set with structural sharing.
#[derive(Debug)]
pub struct IdSet<T: Ord>(Arc<BTreeSet<T>>);

impl<T: Ord> IdSet<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self(Arc::new(BTreeSet::new()))
    }

    /// Whether `id` is a member.
    pub fn contains(&self, id: &T) -> bool {
        self.0.contains(id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate members in order.
    pub fn iter(&self) -> std::collections::btree_set::Iter<'_, T> {
        self.0.iter()
    }

    /// Whether both sets share the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Ord + Clone> IdSet<T> {
    /// Return a set that also contains `id`, or `None` if it was already
    /// a member.
    #[must_use]
    pub fn with(&self, id: T) -> Option<Self> {
        if self.0.contains(&id) {
            return None;
        }
        let mut members = BTreeSet::clone(&self.0);
        members.insert(id);
        Some(Self(Arc::new(members)))
    }

    /// Return a set without `id`, or `None` if it was not a member.
    #[must_use]
    pub fn without(&self, id: &T) -> Option<Self> {
        if !self.0.contains(id) {
            return None;
        }
        let mut members = BTreeSet::clone(&self.0);
        members.remove(id);
        Some(Self(Arc::new(members)))
    }

    /// Return the members that satisfy `keep`, or `None` if every member
    /// does (nothing would be removed).
    #[must_use]
    pub fn retained(&self, mut keep: impl FnMut(&T) -> bool) -> Option<Self> {
        if self.0.iter().all(&mut keep) {
            return None;
        }
        let members: BTreeSet<T> = self.0.iter().filter(|id| keep(*id)).cloned().collect();
        Some(Self(Arc::new(members)))
    }
}

impl<T: Ord> Clone for IdSet<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Ord> Default for IdSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> PartialEq for IdSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl<T: Ord> Eq for IdSet<T> {}

impl<T: Ord> FromIterator<T> for IdSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl<'a, T: Ord> IntoIterator for &'a IdSet<T> {
    type Item = &'a T;
    type IntoIter = std::collections::btree_set::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T: Ord + Serialize> Serialize for IdSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de, T: Ord + Deserialize<'de>> Deserialize<'de> for IdSet<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeSet::<T>::deserialize(deserializer).map(|members| Self(Arc::new(members)))
    }
}
