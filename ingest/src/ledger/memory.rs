use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::IngestResult;
use crate::ledger::RunLedger;
use crate::types::RunStats;

/// Ledger keeping run stats in memory and logging them.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    rows: Arc<Mutex<Vec<RunStats>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self) -> Vec<RunStats> {
        self.rows.lock().await.clone()
    }

    /// Returns the rows written for `alias`, oldest first.
    pub async fn rows_for(&self, alias: &str) -> Vec<RunStats> {
        self.rows
            .lock()
            .await
            .iter()
            .filter(|stats| stats.identity.alias == alias)
            .cloned()
            .collect()
    }
}

impl RunLedger for MemoryLedger {
    async fn write(&self, stats: &RunStats) -> IngestResult<()> {
        info!(
            alias = %stats.identity.alias,
            table = %stats.identity,
            status = %stats.status,
            pages = stats.counters.pages,
            records = stats.counters.records,
            elapsed_ms = stats.elapsed_ms,
            "recorded table run"
        );
        self.rows.lock().await.push(stats.clone());

        Ok(())
    }
}
