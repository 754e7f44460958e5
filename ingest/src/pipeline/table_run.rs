use std::path::PathBuf;
use std::sync::Arc;

use ingest_config::shared::{IngestConfig, LoadType, TableJobSpec};
use metrics::counter;
use tracing::{Instrument, error, info, info_span, warn};

use crate::credentials::{CredentialProvider, source_credentials_key, target_credentials_key};
use crate::error::{ErrorKind, IngestResult};
use crate::ingest_error;
use crate::metrics::{INGEST_TABLE_RUNS_TOTAL, STATUS, TABLE};
use crate::paths::TablePaths;
use crate::pipeline::extract::{BatchState, Extraction, LoopEnd};
use crate::pipeline::factory::ConnectorFactory;
use crate::stager::Stager;
use crate::types::{RunRecorder, RunStats, TableIdentity};
use crate::warehouse::Warehouse;
use crate::writer::BatchWriter;

/// Settings shared by every table run of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub data_root: PathBuf,
    pub scripts_root: PathBuf,
    /// Number of page files per flush.
    pub max_files: usize,
}

impl From<&IngestConfig> for RunSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            data_root: config.data_root.clone(),
            scripts_root: config.scripts_root.clone(),
            max_files: config.batch.max_files,
        }
    }
}

/// Runs the full lifecycle of a single table.
///
/// A run never returns an error: every outcome, including failures to load
/// credentials, is folded into the returned [`RunStats`].
#[derive(Debug)]
pub struct TableRunner<F, C, S> {
    settings: Arc<RunSettings>,
    factory: Arc<F>,
    credentials: Arc<C>,
    stager: Arc<S>,
}

impl<F, C, S> Clone for TableRunner<F, C, S> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            factory: self.factory.clone(),
            credentials: self.credentials.clone(),
            stager: self.stager.clone(),
        }
    }
}

impl<F, C, S> TableRunner<F, C, S>
where
    F: ConnectorFactory + Sync,
    C: CredentialProvider + Sync,
    S: Stager + Sync,
{
    pub fn new(settings: RunSettings, factory: F, credentials: C, stager: S) -> Self {
        Self {
            settings: Arc::new(settings),
            factory: Arc::new(factory),
            credentials: Arc::new(credentials),
            stager: Arc::new(stager),
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub async fn run(&self, spec: &TableJobSpec) -> RunStats {
        let identity = TableIdentity::from_spec(spec);
        let span = info_span!(
            "table_run",
            alias = %spec.alias,
            table = %identity,
            load_type = %spec.load_type
        );
        let recorder = RunRecorder::start(identity, Some(spec.load_type));

        let mut state = BatchState::default();
        let result = self.execute(spec, &mut state).instrument(span.clone()).await;
        let stats = recorder.finish(&result, state.counters());

        span.in_scope(|| match &result {
            Ok(()) => info!(
                pages = stats.counters.pages,
                records = stats.counters.records,
                flushes = stats.counters.flushes,
                elapsed_ms = stats.elapsed_ms,
                "table run succeeded"
            ),
            Err(err) => error!(
                pages = stats.counters.pages,
                flushes = stats.counters.flushes,
                elapsed_ms = stats.elapsed_ms,
                error = %err,
                "table run failed"
            ),
        });
        counter!(
            INGEST_TABLE_RUNS_TOTAL,
            TABLE => spec.alias.clone(),
            STATUS => stats.status.as_str()
        )
        .increment(1);

        stats
    }

    async fn execute(&self, spec: &TableJobSpec, state: &mut BatchState) -> IngestResult<()> {
        let paths = TablePaths::derive(spec, &self.settings.data_root, &self.settings.scripts_root);

        let source_credentials = self.credentials.get(&source_credentials_key(spec)).await?;
        let target_credentials = self.credentials.get(&target_credentials_key(spec)).await?;
        let source = self.factory.source(spec, &source_credentials).await?;
        let warehouse = self.factory.warehouse(spec, &target_credentials).await?;

        let mut writer = BatchWriter::new(&paths.local_dir, &spec.source.table);
        self.prepare(&paths, &writer).await?;

        if spec.load_type == LoadType::Reload {
            let table = TableIdentity::from_spec(spec).qualified_name();
            warehouse.truncate(&table).await.map_err(|err| {
                ingest_error!(
                    ErrorKind::TruncateFailed,
                    "Failed to truncate target table",
                    format!("{table}: {err}")
                )
            })?;
            info!(table, "truncated target table");
        }

        let extraction = Extraction {
            spec,
            paths: &paths,
            source: &source,
            stager: self.stager.as_ref(),
            warehouse: &warehouse,
            max_files: self.settings.max_files,
        };
        let end = extraction.run(&mut writer, state).await?;

        let soft_delete = if end == LoopEnd::Exhausted && spec.soft_delete {
            self.soft_delete(&paths, &warehouse).await
        } else {
            Ok(())
        };

        // Every flushed batch is merged by now, so the staged files go even
        // when the soft delete failed.
        let cleanup = self.cleanup(&paths, &writer).await;
        if let (Err(_), Err(err)) = (&soft_delete, &cleanup) {
            warn!(error = %err, "cleanup after failed soft delete did not complete");
        }

        soft_delete.and(cleanup)
    }

    async fn soft_delete<W>(&self, paths: &TablePaths, warehouse: &W) -> IngestResult<()>
    where
        W: Warehouse + Sync,
    {
        warehouse
            .execute_script(&paths.soft_delete_script)
            .await
            .map_err(|err| {
                ingest_error!(
                    ErrorKind::SoftDeleteFailed,
                    "Soft delete script failed",
                    format!("{}: {err}", paths.soft_delete_script.display())
                )
            })?;
        info!(script = %paths.soft_delete_script.display(), "ran soft delete script");

        Ok(())
    }

    /// Resets local and remote leftovers of an earlier failed attempt, so a
    /// retry never merges stale page files.
    async fn prepare(&self, paths: &TablePaths, writer: &BatchWriter) -> IngestResult<()> {
        writer.prepare().await?;
        self.stager.delete_prefix(&paths.staging_prefix).await?;
        self.stager.delete_prefix(&paths.processed_prefix).await?;

        Ok(())
    }

    async fn cleanup(&self, paths: &TablePaths, writer: &BatchWriter) -> IngestResult<()> {
        let archived = self.stager.delete_prefix(&paths.processed_prefix).await?;
        let purged = writer.purge().await?;
        info!(archived, purged, "cleaned up staged and local files");

        Ok(())
    }
}
