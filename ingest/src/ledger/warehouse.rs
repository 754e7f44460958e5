use crate::error::{ErrorKind, IngestResult};
use crate::ingest_error;
use crate::ledger::RunLedger;
use crate::types::RunStats;
use crate::warehouse::Warehouse;

/// Ledger inserting one row per run into a warehouse table.
#[derive(Debug)]
pub struct WarehouseLedger<W> {
    warehouse: W,
    table: String,
}

impl<W> WarehouseLedger<W> {
    pub fn new(warehouse: W, table: impl Into<String>) -> Self {
        Self {
            warehouse,
            table: table.into(),
        }
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }
}

impl<W> RunLedger for WarehouseLedger<W>
where
    W: Warehouse + Sync,
{
    async fn write(&self, stats: &RunStats) -> IngestResult<()> {
        let columns = stats.to_columns();
        self.warehouse
            .insert_row(&self.table, &columns)
            .await
            .map_err(|err| {
                ingest_error!(
                    ErrorKind::LedgerWriteFailed,
                    "Failed to insert run stats",
                    format!("{}: {err}", self.table)
                )
            })
    }
}
