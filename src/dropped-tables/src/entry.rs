//! Records kept for each table that is pending removal.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

/// Identity of a table as it was at the moment it was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentity {
    pub database: String,
    pub table: String,
    pub uuid: Uuid,
    /// Engine name, for display only. Empty when unknown.
    pub engine: String,
}

impl TableIdentity {
    pub fn new(database: impl Into<String>, table: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            uuid,
            engine: String::new(),
        }
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }
}

impl fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({})", self.database, self.table, self.uuid)
    }
}

/// Lifecycle state of a tracked entry.
///
/// An entry that has been reclaimed or undropped is deleted from the store,
/// so there is no stored "removed" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    Pending,
    Reclaiming,
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Pending => "pending",
            EntryState::Reclaiming => "reclaiming",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One table pending removal.
///
/// Fields other than `state` are fixed when the entry is created. Only the
/// registry constructs entries; everything else sees copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedTableEntry {
    identity: TableIdentity,
    metadata_path: String,
    dropped_at: DateTime<Utc>,
    reclaim_after: DateTime<Utc>,
    pub(crate) state: EntryState,
}

impl DroppedTableEntry {
    pub(crate) fn new(
        identity: TableIdentity,
        metadata_path: String,
        dropped_at: DateTime<Utc>,
        grace_period: Duration,
    ) -> Self {
        Self {
            identity,
            metadata_path,
            dropped_at,
            reclaim_after: reclaim_deadline(dropped_at, grace_period),
            state: EntryState::Pending,
        }
    }

    pub fn identity(&self) -> &TableIdentity {
        &self.identity
    }

    pub fn uuid(&self) -> Uuid {
        self.identity.uuid
    }

    pub fn database(&self) -> &str {
        &self.identity.database
    }

    pub fn table(&self) -> &str {
        &self.identity.table
    }

    /// Opaque handle passed to the physical delete capability.
    pub fn metadata_path(&self) -> &str {
        &self.metadata_path
    }

    pub fn dropped_at(&self) -> DateTime<Utc> {
        self.dropped_at
    }

    pub fn reclaim_after(&self) -> DateTime<Utc> {
        self.reclaim_after
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == EntryState::Pending
    }

    /// A pending entry is due once `now` reaches `reclaim_after`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.reclaim_after <= now
    }

    pub fn into_identity(self) -> TableIdentity {
        self.identity
    }
}

/// `dropped_at + grace`, saturating at the end of the representable range.
fn reclaim_deadline(dropped_at: DateTime<Utc>, grace: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(grace)
        .ok()
        .and_then(|delta| dropped_at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
