//! Deferred-drop registry for tables awaiting physical removal.
//!
//! A dropped table is not deleted right away. Its metadata and data stay on
//! disk for a grace period so the drop can be undone, and a background
//! reclaimer deletes them once the period has passed.
//!
//! - `store`: concurrent entry map with per-key conditional updates
//! - `registry`: drop / undrop / reclaim state machine
//! - `reclaimer`: periodic sweep invoking the physical delete capability
//! - `snapshot`: point-in-time listing for the system view
//! - `system_view`: DataFusion table provider over the snapshot
//! - `recovery`: re-registers dropped tables found on disk at startup

pub mod delete;
pub mod entry;
pub mod error;
pub mod metrics;
pub mod reclaimer;
pub mod recovery;
pub mod registry;
pub mod snapshot;
pub mod store;
pub mod system_view;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use delete::{FsDeleter, PhysicalDelete};
pub use entry::{DroppedTableEntry, EntryState, TableIdentity};
pub use error::{RegistryError, Result};
pub use metrics::{MetricsSummary, ReclaimMetrics};
pub use reclaimer::{Reclaimer, ReclaimerConfig, ReclaimerHandle, TickReport};
pub use recovery::{RecoveryReport, scan_metadata_dropped};
pub use registry::DroppedTablesRegistry;
pub use snapshot::{DroppedTableRow, SnapshotProvider};
pub use store::{Conflict, EntryStore};
pub use system_view::MarkedDroppedTablesProvider;
