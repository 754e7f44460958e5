use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, IngestResult};
use crate::test_utils::timeline::{Timeline, TimelineEvent};
use crate::types::Cell;
use crate::warehouse::Warehouse;

/// Operation received by a [`MemoryWarehouse`].
#[derive(Debug, Clone, PartialEq)]
pub enum WarehouseOp {
    Truncate(String),
    Script(PathBuf),
    Insert(String, Vec<(String, Cell)>),
}

#[derive(Debug)]
struct ScriptFailure {
    fragment: String,
    remaining: usize,
}

#[derive(Debug, Default)]
struct Inner {
    ops: Vec<WarehouseOp>,
    script_failures: Vec<ScriptFailure>,
    failing_truncates: Vec<String>,
    failing_inserts: bool,
}

/// Warehouse recording every operation instead of executing it.
///
/// Script files are not read. Failures can be scripted per script path
/// fragment, per truncated table or for all inserts.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    inner: Arc<Mutex<Inner>>,
    timeline: Option<Timeline>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    /// Fails the next `times` scripts whose path contains `fragment`.
    pub async fn fail_scripts(&self, fragment: impl Into<String>, times: usize) {
        self.inner.lock().await.script_failures.push(ScriptFailure {
            fragment: fragment.into(),
            remaining: times,
        });
    }

    pub async fn fail_truncate(&self, table: impl Into<String>) {
        self.inner.lock().await.failing_truncates.push(table.into());
    }

    pub async fn fail_inserts(&self) {
        self.inner.lock().await.failing_inserts = true;
    }

    pub async fn ops(&self) -> Vec<WarehouseOp> {
        self.inner.lock().await.ops.clone()
    }

    /// Number of scripts executed whose path contains `fragment`.
    pub async fn scripts_run(&self, fragment: &str) -> usize {
        self.inner
            .lock()
            .await
            .ops
            .iter()
            .filter(|op| {
                matches!(op, WarehouseOp::Script(path) if path.to_string_lossy().contains(fragment))
            })
            .count()
    }

    pub async fn truncates(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .ops
            .iter()
            .filter_map(|op| match op {
                WarehouseOp::Truncate(table) => Some(table.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, event: TimelineEvent) {
        if let Some(timeline) = &self.timeline {
            timeline.record(event).await;
        }
    }
}

impl Warehouse for MemoryWarehouse {
    async fn truncate(&self, qualified_table: &str) -> IngestResult<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.failing_truncates.iter().any(|table| table == qualified_table) {
                bail!(
                    ErrorKind::DestinationQueryFailed,
                    "Scripted truncate failure",
                    qualified_table
                );
            }
            inner.ops.push(WarehouseOp::Truncate(qualified_table.to_owned()));
        }

        self.record(TimelineEvent::Truncate {
            table: qualified_table.to_owned(),
        })
        .await;

        Ok(())
    }

    async fn execute_script(&self, script: &Path) -> IngestResult<()> {
        let path = script.to_string_lossy().into_owned();
        {
            let mut inner = self.inner.lock().await;
            if let Some(failure) = inner
                .script_failures
                .iter_mut()
                .find(|failure| failure.remaining > 0 && path.contains(&failure.fragment))
            {
                failure.remaining -= 1;
                bail!(
                    ErrorKind::DestinationQueryFailed,
                    "Scripted script failure",
                    path
                );
            }
            inner.ops.push(WarehouseOp::Script(script.to_path_buf()));
        }

        info!(script = %path, "executed script");
        self.record(TimelineEvent::Script { path }).await;

        Ok(())
    }

    async fn insert_row(
        &self,
        qualified_table: &str,
        columns: &[(&str, Cell)],
    ) -> IngestResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.failing_inserts {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Scripted insert failure",
                qualified_table
            );
        }

        let columns = columns
            .iter()
            .map(|(name, cell)| ((*name).to_owned(), cell.clone()))
            .collect();
        inner
            .ops
            .push(WarehouseOp::Insert(qualified_table.to_owned(), columns));

        Ok(())
    }
}
