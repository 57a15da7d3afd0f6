//! Drop / undrop / reclaim state machine over the entry store.
//!
//! ```text
//! Pending --begin_reclaim--> Reclaiming --complete_reclaim--> (removed)
//! Reclaiming --abort_reclaim--> Pending
//! Pending --undrop--> (removed)
//! ```
//!
//! Every transition is a single conditional update on the store, so two
//! transitions on the same table can never both succeed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entry::{DroppedTableEntry, EntryState, TableIdentity};
use crate::error::{RegistryError, Result};
use crate::store::{Conflict, EntryStore};

/// Registry of tables that were dropped but not yet physically removed.
#[derive(Debug, Default)]
pub struct DroppedTablesRegistry {
    store: EntryStore,
}

impl DroppedTablesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a dropped table.
    ///
    /// The caller guarantees that `identity.uuid` is unique across live and
    /// dropped tables; a duplicate is reported as `AlreadyExists`.
    pub fn mark_dropped(
        &self,
        identity: TableIdentity,
        metadata_path: impl Into<String>,
        now: DateTime<Utc>,
        grace_period: Duration,
    ) -> Result<DroppedTableEntry> {
        let entry = DroppedTableEntry::new(identity, metadata_path.into(), now, grace_period);
        self.store.insert(entry.clone())?;

        info!(
            uuid = %entry.uuid(),
            database = %entry.database(),
            table = %entry.table(),
            reclaim_after = %entry.reclaim_after(),
            "Table marked as dropped"
        );

        Ok(entry)
    }

    /// Cancel a pending removal and hand back the stored entry so the caller
    /// can restore the table.
    ///
    /// Refused with `InProgress` once the reclaimer has started deleting.
    pub fn undrop(&self, uuid: Uuid) -> Result<DroppedTableEntry> {
        match self.store.compare_and_remove(&uuid, EntryState::Pending) {
            Ok(entry) => {
                info!(
                    uuid = %uuid,
                    database = %entry.database(),
                    table = %entry.table(),
                    "Dropped table restored"
                );
                Ok(entry)
            }
            Err(Conflict::Missing) => Err(RegistryError::NotFound(uuid)),
            Err(Conflict::State(_)) => {
                debug!(uuid = %uuid, "Undrop refused, reclaim in progress");
                Err(RegistryError::InProgress(uuid))
            }
        }
    }

    /// Move a pending entry to `Reclaiming` and return it.
    pub fn begin_reclaim(&self, uuid: Uuid) -> Result<DroppedTableEntry> {
        let entry = self
            .store
            .compare_and_transition(&uuid, EntryState::Pending, EntryState::Reclaiming)
            .map_err(|conflict| match conflict {
                Conflict::Missing => RegistryError::NotFound(uuid),
                Conflict::State(_) => RegistryError::InProgress(uuid),
            })?;

        debug!(uuid = %uuid, metadata_path = %entry.metadata_path(), "Reclaim started");
        Ok(entry)
    }

    /// Forget an entry whose physical delete succeeded.
    ///
    /// `NotFound` unless the entry is currently `Reclaiming`.
    pub fn complete_reclaim(&self, uuid: Uuid) -> Result<()> {
        let entry = self
            .store
            .compare_and_remove(&uuid, EntryState::Reclaiming)
            .map_err(|_| RegistryError::NotFound(uuid))?;

        info!(
            uuid = %uuid,
            database = %entry.database(),
            table = %entry.table(),
            "Dropped table reclaimed"
        );
        Ok(())
    }

    /// Return a `Reclaiming` entry to `Pending` after a failed delete.
    ///
    /// `NotFound` unless the entry is currently `Reclaiming`.
    pub fn abort_reclaim(&self, uuid: Uuid) -> Result<()> {
        self.store
            .compare_and_transition(&uuid, EntryState::Reclaiming, EntryState::Pending)
            .map_err(|_| RegistryError::NotFound(uuid))?;

        debug!(uuid = %uuid, "Reclaim aborted, entry pending again");
        Ok(())
    }

    pub fn get(&self, uuid: Uuid) -> Result<DroppedTableEntry> {
        self.store.get(&uuid)
    }

    pub fn contains(&self, uuid: Uuid) -> bool {
        self.store.contains(&uuid)
    }

    /// Point-in-time copy of every tracked entry.
    pub fn snapshot(&self) -> Vec<DroppedTableEntry> {
        self.store.snapshot()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
