//! Concurrent storage for dropped-table entries.
//!
//! Entries live in a sharded [`DashMap`], so operations on unrelated tables
//! never contend. Every conditional update runs under the shard lock of its
//! key, which makes "check state, then change it" a single atomic step.
//!
//! Mutations also hold the shared side of a snapshot gate. They never block
//! each other on it; only [`EntryStore::snapshot`] takes it exclusively, for
//! the duration of the copy, so a snapshot reflects one instant across all
//! shards.

use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::entry::{DroppedTableEntry, EntryState};
use crate::error::{RegistryError, Result};

/// Why a conditional operation did not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    Missing,
    State(EntryState),
}

#[derive(Debug, Default)]
pub struct EntryStore {
    entries: DashMap<Uuid, DroppedTableEntry>,
    snapshot_gate: RwLock<()>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutation_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.snapshot_gate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new entry. Fails if the uuid is already present.
    pub fn insert(&self, entry: DroppedTableEntry) -> Result<()> {
        let _gate = self.mutation_guard();
        match self.entries.entry(entry.uuid()) {
            Entry::Occupied(occupied) => Err(RegistryError::AlreadyExists(*occupied.key())),
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(())
            }
        }
    }

    pub fn get(&self, uuid: &Uuid) -> Result<DroppedTableEntry> {
        self.entries
            .get(uuid)
            .map(|entry| entry.value().clone())
            .ok_or(RegistryError::NotFound(*uuid))
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.entries.contains_key(uuid)
    }

    /// Remove the entry only if it is currently in `expected` state.
    ///
    /// Returns the removed entry, or why nothing was removed.
    pub fn compare_and_remove(
        &self,
        uuid: &Uuid,
        expected: EntryState,
    ) -> std::result::Result<DroppedTableEntry, Conflict> {
        let _gate = self.mutation_guard();
        match self.entries.entry(*uuid) {
            Entry::Vacant(_) => Err(Conflict::Missing),
            Entry::Occupied(occupied) => {
                let actual = occupied.get().state;
                if actual == expected {
                    Ok(occupied.remove())
                } else {
                    Err(Conflict::State(actual))
                }
            }
        }
    }

    /// Swap the state of an entry in place if it is currently `from`.
    ///
    /// Returns a copy of the entry after the swap.
    pub fn compare_and_transition(
        &self,
        uuid: &Uuid,
        from: EntryState,
        to: EntryState,
    ) -> std::result::Result<DroppedTableEntry, Conflict> {
        let _gate = self.mutation_guard();
        let mut entry = self.entries.get_mut(uuid).ok_or(Conflict::Missing)?;
        if entry.state != from {
            return Err(Conflict::State(entry.state));
        }
        entry.state = to;
        Ok(entry.clone())
    }

    /// Copy every entry as of a single instant.
    pub fn snapshot(&self) -> Vec<DroppedTableEntry> {
        let _gate = self
            .snapshot_gate
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::TableIdentity;
    use chrono::DateTime;
    use std::sync::Arc;
    use std::time::Duration;

    fn entry(uuid: Uuid) -> DroppedTableEntry {
        DroppedTableEntry::new(
            TableIdentity::new("db", "t", uuid),
            format!("store/{uuid}"),
            DateTime::from_timestamp(0, 0).unwrap(),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let store = EntryStore::new();
        let uuid = Uuid::new_v4();

        store.insert(entry(uuid)).unwrap();
        assert_eq!(
            store.insert(entry(uuid)),
            Err(RegistryError::AlreadyExists(uuid))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = EntryStore::new();
        let uuid = Uuid::new_v4();
        assert_eq!(store.get(&uuid), Err(RegistryError::NotFound(uuid)));
    }

    #[test]
    fn test_compare_and_remove_checks_state() {
        let store = EntryStore::new();
        let uuid = Uuid::new_v4();
        store.insert(entry(uuid)).unwrap();

        assert_eq!(
            store.compare_and_remove(&uuid, EntryState::Reclaiming),
            Err(Conflict::State(EntryState::Pending))
        );
        assert!(store.contains(&uuid));

        let removed = store
            .compare_and_remove(&uuid, EntryState::Pending)
            .unwrap();
        assert_eq!(removed.uuid(), uuid);
        assert!(store.is_empty());

        assert_eq!(
            store.compare_and_remove(&uuid, EntryState::Pending),
            Err(Conflict::Missing)
        );
    }

    #[test]
    fn test_transition_swaps_state_in_place() {
        let store = EntryStore::new();
        let uuid = Uuid::new_v4();
        store.insert(entry(uuid)).unwrap();

        let moved = store
            .compare_and_transition(&uuid, EntryState::Pending, EntryState::Reclaiming)
            .unwrap();
        assert_eq!(moved.state(), EntryState::Reclaiming);
        assert_eq!(store.get(&uuid).unwrap().state(), EntryState::Reclaiming);

        assert_eq!(
            store.compare_and_transition(&uuid, EntryState::Pending, EntryState::Reclaiming),
            Err(Conflict::State(EntryState::Reclaiming))
        );
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let store = EntryStore::new();
        let uuid = Uuid::new_v4();
        store.insert(entry(uuid)).unwrap();

        let snapshot = store.snapshot();
        store.compare_and_remove(&uuid, EntryState::Pending).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].uuid(), uuid);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_only_one_concurrent_transition_wins() {
        let store = Arc::new(EntryStore::new());
        let uuid = Uuid::new_v4();
        store.insert(entry(uuid)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .compare_and_transition(
                            &uuid,
                            EntryState::Pending,
                            EntryState::Reclaiming,
                        )
                        .is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_snapshot_sees_whole_swaps_only() {
        // Writers keep exactly one of each pair present. A snapshot taken at a
        // single instant therefore always holds exactly one per pair.
        let store = Arc::new(EntryStore::new());
        let pairs: Vec<(Uuid, Uuid)> = (0..4).map(|_| (Uuid::new_v4(), Uuid::new_v4())).collect();
        for (a, _) in &pairs {
            store.insert(entry(*a)).unwrap();
        }

        let writers: Vec<_> = pairs
            .iter()
            .copied()
            .map(|(a, b)| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
                        // Insert the replacement first, then remove the old one,
                        // so at most two are ever visible and at least one is.
                        store.insert(entry(to)).unwrap();
                        store.compare_and_remove(&from, EntryState::Pending).unwrap();
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            let snapshot = store.snapshot();
            for (a, b) in &pairs {
                let present = snapshot
                    .iter()
                    .filter(|e| e.uuid() == *a || e.uuid() == *b)
                    .count();
                assert!((1..=2).contains(&present));
            }
            let mut ids: Vec<Uuid> = snapshot.iter().map(|e| e.uuid()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), snapshot.len(), "no uuid appears twice");
        }

        for writer in writers {
            writer.join().unwrap();
        }
    }
}
