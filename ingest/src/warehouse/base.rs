use std::future::Future;
use std::path::Path;

use crate::error::{ErrorKind, IngestResult};
use crate::ingest_error;
use crate::types::Cell;

/// Target warehouse of a table run.
///
/// Tables are addressed by their `DATABASE.SCHEMA.TABLE` name. Scripts are
/// opaque SQL files owned by the deployment.
pub trait Warehouse {
    fn truncate(&self, qualified_table: &str) -> impl Future<Output = IngestResult<()>> + Send;

    /// Runs every statement of the script at `script`.
    fn execute_script(&self, script: &Path) -> impl Future<Output = IngestResult<()>> + Send;

    fn insert_row(
        &self,
        qualified_table: &str,
        columns: &[(&str, Cell)],
    ) -> impl Future<Output = IngestResult<()>> + Send;
}

/// Reads a script file, failing with [`ErrorKind::IoError`] and the path when
/// it cannot be read.
pub async fn read_script(script: &Path) -> IngestResult<String> {
    tokio::fs::read_to_string(script).await.map_err(|err| {
        ingest_error!(
            ErrorKind::IoError,
            "Failed to read script",
            format!("{}: {err}", script.display())
        )
    })
}
