use std::future::Future;

use crate::error::IngestResult;
use crate::types::RunStats;

/// Append-only record of table run outcomes.
pub trait RunLedger {
    fn write(&self, stats: &RunStats) -> impl Future<Output = IngestResult<()>> + Send;
}
