//! Ordered, de-duplicated collections persisted as one JSON array per key.

use std::{collections::HashSet, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

use crate::dao::{
    models::{
        COMPARISON_KEY, CollectionEntry, FAVORITES_KEY, HISTORY_KEY, Keyed, RECENT_SEARCHES_KEY,
        TournamentId,
    },
    storage::{KeyValueStore, StorageError, read_json, write_json},
};

/// Capacity of the recently viewed list.
pub const HISTORY_CAPACITY: usize = 20;
/// Capacity of the comparison selection.
pub const COMPARISON_CAPACITY: usize = 4;
/// Number of search queries remembered.
pub const RECENT_SEARCHES_CAPACITY: usize = 5;

/// Failures raised when mutating a collection.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("limit reached: at most {capacity} tournaments can be selected")]
    LimitReached { capacity: usize },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What happens when an already present id is added again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    Ignore,
    /// Drop the old entry and insert the new snapshot at the insertion point.
    Refresh,
}

/// What happens when an insertion would exceed the capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    EvictOldest,
    Reject,
}

/// Where new entries go; the opposite end holds the oldest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertAt {
    Front,
    Back,
}

/// Static behaviour of a collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectionRules {
    pub storage_key: &'static str,
    pub capacity: Option<usize>,
    pub on_duplicate: DuplicatePolicy,
    pub on_overflow: OverflowPolicy,
    pub insert_at: InsertAt,
}

impl CollectionRules {
    /// Uncapped, re-adding is a no-op.
    pub const FAVORITES: Self = Self {
        storage_key: FAVORITES_KEY,
        capacity: None,
        on_duplicate: DuplicatePolicy::Ignore,
        on_overflow: OverflowPolicy::Reject,
        insert_at: InsertAt::Back,
    };

    /// Newest first, re-visits move to the front, the oldest visit falls off.
    pub const HISTORY: Self = Self {
        storage_key: HISTORY_KEY,
        capacity: Some(HISTORY_CAPACITY),
        on_duplicate: DuplicatePolicy::Refresh,
        on_overflow: OverflowPolicy::EvictOldest,
        insert_at: InsertAt::Front,
    };

    /// Small selection; a full selection refuses new entries.
    pub const COMPARISON: Self = Self {
        storage_key: COMPARISON_KEY,
        capacity: Some(COMPARISON_CAPACITY),
        on_duplicate: DuplicatePolicy::Ignore,
        on_overflow: OverflowPolicy::Reject,
        insert_at: InsertAt::Back,
    };

    /// Newest first; a repeated query keeps its old place.
    pub const RECENT_SEARCHES: Self = Self {
        storage_key: RECENT_SEARCHES_KEY,
        capacity: Some(RECENT_SEARCHES_CAPACITY),
        on_duplicate: DuplicatePolicy::Ignore,
        on_overflow: OverflowPolicy::EvictOldest,
        insert_at: InsertAt::Front,
    };
}

/// Result of a successful [`BoundedCollection::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome<K = TournamentId> {
    Added,
    AlreadyPresent,
    Refreshed,
    /// Inserted after evicting the oldest entry.
    Evicted(K),
}

/// Result of a successful [`BoundedCollection::toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
}

/// Collection of tournaments with unique ids and an optional capacity.
///
/// Every mutation rewrites the whole array under the storage key before returning. When the
/// write fails the collection keeps its previous contents.
pub struct BoundedCollection<T> {
    rules: CollectionRules,
    store: Arc<dyn KeyValueStore>,
    items: Vec<T>,
}

/// Favorite tournaments with their display snapshot.
pub type Favorites = BoundedCollection<CollectionEntry>;
/// Recently viewed tournaments, newest first.
pub type History = BoundedCollection<CollectionEntry>;
/// Ids selected for side-by-side comparison.
pub type Comparison = BoundedCollection<TournamentId>;
/// Last search queries, newest first.
pub type RecentSearches = BoundedCollection<String>;

impl<T> BoundedCollection<T>
where
    T: Keyed + Clone + Serialize + DeserializeOwned,
{
    /// Load the collection, repairing duplicate ids and over-capacity arrays left by older
    /// versions or concurrent tabs.
    pub fn load(store: Arc<dyn KeyValueStore>, rules: CollectionRules) -> Self {
        let stored: Vec<T> = read_json(store.as_ref(), rules.storage_key).unwrap_or_default();
        let stored_len = stored.len();

        let mut seen = HashSet::new();
        let mut items: Vec<T> = stored
            .into_iter()
            .filter(|item| seen.insert(item.key()))
            .collect();
        if let Some(capacity) = rules.capacity {
            match rules.insert_at {
                InsertAt::Front => items.truncate(capacity),
                InsertAt::Back => {
                    let excess = items.len().saturating_sub(capacity);
                    items.drain(..excess);
                }
            }
        }

        if items.len() != stored_len {
            warn!(
                key = rules.storage_key,
                stored = stored_len,
                kept = items.len(),
                "repaired stored collection"
            );
        }

        Self {
            rules,
            store,
            items,
        }
    }

    pub fn rules(&self) -> &CollectionRules {
        &self.rules
    }

    /// Read-only ordered snapshot.
    pub fn list(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: T::Key) -> bool {
        self.position(&id).is_some()
    }

    pub fn get(&self, id: T::Key) -> Option<&T> {
        self.position(&id).map(|index| &self.items[index])
    }

    pub fn is_full(&self) -> bool {
        self.rules
            .capacity
            .is_some_and(|capacity| self.items.len() >= capacity)
    }

    pub fn add(&mut self, item: T) -> Result<AddOutcome<T::Key>, CollectionError> {
        let id = item.key();
        let mut candidate = self.items.clone();

        if let Some(index) = self.position(&id) {
            match self.rules.on_duplicate {
                DuplicatePolicy::Ignore => return Ok(AddOutcome::AlreadyPresent),
                DuplicatePolicy::Refresh => {
                    candidate.remove(index);
                    self.insert(&mut candidate, item);
                    self.commit(candidate)?;
                    return Ok(AddOutcome::Refreshed);
                }
            }
        }

        let mut outcome = AddOutcome::Added;
        if self.is_full() {
            match self.rules.on_overflow {
                OverflowPolicy::Reject => {
                    let capacity = self.rules.capacity.unwrap_or(self.items.len());
                    return Err(CollectionError::LimitReached { capacity });
                }
                OverflowPolicy::EvictOldest => {
                    let evicted = match self.rules.insert_at {
                        InsertAt::Front => candidate.pop(),
                        InsertAt::Back => Some(candidate.remove(0)),
                    };
                    if let Some(evicted) = evicted {
                        outcome = AddOutcome::Evicted(evicted.key());
                    }
                }
            }
        }

        self.insert(&mut candidate, item);
        self.commit(candidate)?;
        debug!(key = self.rules.storage_key, id = ?id, "collection entry added");
        Ok(outcome)
    }

    /// Remove `id`; returns whether it was present.
    pub fn remove(&mut self, id: T::Key) -> Result<bool, StorageError> {
        let Some(index) = self.position(&id) else {
            return Ok(false);
        };
        let mut candidate = self.items.clone();
        candidate.remove(index);
        self.commit(candidate)?;
        Ok(true)
    }

    /// Remove `item` when present, add it otherwise.
    pub fn toggle(&mut self, item: T) -> Result<ToggleOutcome, CollectionError> {
        if self.remove(item.key())? {
            return Ok(ToggleOutcome::Removed);
        }
        self.add(item)?;
        Ok(ToggleOutcome::Added)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.commit(Vec::new())
    }

    fn position(&self, id: &T::Key) -> Option<usize> {
        self.items.iter().position(|item| item.key() == *id)
    }

    fn insert(&self, items: &mut Vec<T>, item: T) {
        match self.rules.insert_at {
            InsertAt::Front => items.insert(0, item),
            InsertAt::Back => items.push(item),
        }
    }

    fn commit(&mut self, candidate: Vec<T>) -> Result<(), StorageError> {
        write_json(self.store.as_ref(), self.rules.storage_key, &candidate)?;
        self.items = candidate;
        Ok(())
    }
}
