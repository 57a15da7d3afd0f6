//! Read-only listing of the registry for the system view.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entry::DroppedTableEntry;
use crate::registry::DroppedTablesRegistry;

/// One row of the dropped tables view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedTableRow {
    /// Position of the row within its scan
    pub index: u32,
    pub database: String,
    pub table: String,
    pub uuid: Uuid,
    pub engine: String,
    pub metadata_dropped_path: String,
    pub table_dropped_time: DateTime<Utc>,
    pub reclaim_after: DateTime<Utc>,
}

impl DroppedTableRow {
    fn from_entry(index: u32, entry: DroppedTableEntry) -> Self {
        let table_dropped_time = entry.dropped_at();
        let reclaim_after = entry.reclaim_after();
        let metadata_dropped_path = entry.metadata_path().to_string();
        let identity = entry.into_identity();

        Self {
            index,
            database: identity.database,
            table: identity.table,
            uuid: identity.uuid,
            engine: identity.engine,
            metadata_dropped_path,
            table_dropped_time,
            reclaim_after,
        }
    }
}

/// Produces point-in-time views of the registry.
///
/// Every [`scan`](SnapshotProvider::scan) copies the registry once and then
/// yields rows from that private copy, so scans are independent of each other
/// and of later mutations. Only tables still waiting out their grace period
/// are listed; one the reclaimer is deleting is already on its way out.
/// Row order is unspecified.
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    registry: Arc<DroppedTablesRegistry>,
}

impl SnapshotProvider {
    pub fn new(registry: Arc<DroppedTablesRegistry>) -> Self {
        Self { registry }
    }

    pub fn scan(&self) -> impl ExactSizeIterator<Item = DroppedTableRow> + Send + 'static {
        let mut entries = self.registry.snapshot();
        entries.retain(DroppedTableEntry::is_pending);
        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                DroppedTableRow::from_entry(u32::try_from(index).unwrap_or(u32::MAX), entry)
            })
    }
}
