//! `marked_dropped_tables` system table.
//!
//! Exposes the registry as a DataFusion table. Every scan takes a fresh
//! snapshot, so a query always sees one consistent state of the registry.
//! Tables the reclaimer is already deleting are left out.

use std::any::Any;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use datafusion::arrow::array::{ArrayRef, StringArray, TimestampSecondArray, UInt32Array};
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use datafusion::arrow::error::ArrowError;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::catalog::Session;
use datafusion::datasource::{MemTable, TableProvider, TableType};
use datafusion::error::Result as DataFusionResult;
use datafusion::logical_expr::Expr;
use datafusion::physical_plan::ExecutionPlan;
use datafusion::prelude::SessionContext;

use crate::registry::DroppedTablesRegistry;
use crate::snapshot::{DroppedTableRow, SnapshotProvider};

pub const TABLE_NAME: &str = "marked_dropped_tables";

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    let timestamp = DataType::Timestamp(TimeUnit::Second, Some("UTC".into()));
    Arc::new(Schema::new(vec![
        Field::new("index", DataType::UInt32, false),
        Field::new("database", DataType::Utf8, false),
        Field::new("table", DataType::Utf8, false),
        Field::new("uuid", DataType::Utf8, false),
        Field::new("engine", DataType::Utf8, false),
        Field::new("metadata_dropped_path", DataType::Utf8, false),
        Field::new("table_dropped_time", timestamp.clone(), false),
        Field::new("reclaim_after", timestamp, false),
    ]))
});

pub fn schema() -> SchemaRef {
    SCHEMA.clone()
}

/// Convert rows to a record batch with the [`schema`] layout.
pub fn rows_to_batch(rows: &[DroppedTableRow]) -> Result<RecordBatch, ArrowError> {
    let index: ArrayRef = Arc::new(UInt32Array::from_iter_values(
        rows.iter().map(|row| row.index),
    ));
    let database: ArrayRef = Arc::new(StringArray::from_iter_values(
        rows.iter().map(|row| row.database.as_str()),
    ));
    let table: ArrayRef = Arc::new(StringArray::from_iter_values(
        rows.iter().map(|row| row.table.as_str()),
    ));
    let uuid: ArrayRef = Arc::new(StringArray::from_iter_values(
        rows.iter().map(|row| row.uuid.to_string()),
    ));
    let engine: ArrayRef = Arc::new(StringArray::from_iter_values(
        rows.iter().map(|row| row.engine.as_str()),
    ));
    let metadata_dropped_path: ArrayRef = Arc::new(StringArray::from_iter_values(
        rows.iter().map(|row| row.metadata_dropped_path.as_str()),
    ));
    let table_dropped_time: ArrayRef = Arc::new(
        TimestampSecondArray::from_iter_values(
            rows.iter().map(|row| row.table_dropped_time.timestamp()),
        )
        .with_timezone("UTC"),
    );
    let reclaim_after: ArrayRef = Arc::new(
        TimestampSecondArray::from_iter_values(
            rows.iter().map(|row| row.reclaim_after.timestamp()),
        )
        .with_timezone("UTC"),
    );

    RecordBatch::try_new(
        schema(),
        vec![
            index,
            database,
            table,
            uuid,
            engine,
            metadata_dropped_path,
            table_dropped_time,
            reclaim_after,
        ],
    )
}

/// DataFusion provider for [`TABLE_NAME`].
#[derive(Debug, Clone)]
pub struct MarkedDroppedTablesProvider {
    snapshots: SnapshotProvider,
}

impl MarkedDroppedTablesProvider {
    pub fn new(registry: Arc<DroppedTablesRegistry>) -> Self {
        Self {
            snapshots: SnapshotProvider::new(registry),
        }
    }

    /// Snapshot the registry into a single batch.
    pub fn load_batch(&self) -> Result<RecordBatch, ArrowError> {
        let rows: Vec<DroppedTableRow> = self.snapshots.scan().collect();
        rows_to_batch(&rows)
    }

    /// Register the provider on `ctx` under [`TABLE_NAME`].
    pub fn register(self, ctx: &SessionContext) -> DataFusionResult<()> {
        ctx.register_table(TABLE_NAME, Arc::new(self))?;
        Ok(())
    }
}

#[async_trait]
impl TableProvider for MarkedDroppedTablesProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        schema()
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    async fn scan(
        &self,
        state: &dyn Session,
        projection: Option<&Vec<usize>>,
        filters: &[Expr],
        limit: Option<usize>,
    ) -> DataFusionResult<Arc<dyn ExecutionPlan>> {
        let batch = self.load_batch()?;
        let table = MemTable::try_new(schema(), vec![vec![batch]])?;
        table.scan(state, projection, filters, limit).await
    }
}
