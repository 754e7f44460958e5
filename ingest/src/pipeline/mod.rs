//! Ingestion of every table of a job file.
//!
//! [`IngestPipeline`] drives one [`TableRunner`] per table. Tables are isolated
//! from each other: a failing or panicking table is recorded as unsuccessful in
//! the run ledger and the remaining tables still run.

mod extract;
mod factory;
mod report;
mod table_run;

pub use extract::{BatchState, Extraction, LoopEnd, Step};
pub use factory::ConnectorFactory;
pub use report::PipelineReport;
pub use table_run::{RunSettings, TableRunner};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ingest_config::shared::{IngestConfig, JobFile, TableJobSpec};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::credentials::CredentialProvider;
use crate::error::{ErrorKind, IngestError};
use crate::ingest_error;
use crate::ledger::RunLedger;
use crate::metrics::register_metrics;
use crate::paths::TablePaths;
use crate::stager::Stager;
use crate::types::{RunCounters, RunRecorder, RunStats, RunStatus, TableIdentity};

#[derive(Debug)]
pub struct IngestPipeline<F, C, S, L> {
    runner: TableRunner<F, C, S>,
    ledger: Arc<L>,
    max_parallel_tables: usize,
}

impl<F, C, S, L> IngestPipeline<F, C, S, L>
where
    F: ConnectorFactory + Send + Sync + 'static,
    C: CredentialProvider + Send + Sync + 'static,
    S: Stager + Send + Sync + 'static,
    L: RunLedger + Send + Sync + 'static,
{
    pub fn new(config: &IngestConfig, factory: F, credentials: C, stager: S, ledger: L) -> Self {
        // Safe to call for every pipeline, descriptions are registered once.
        register_metrics();

        Self {
            runner: TableRunner::new(RunSettings::from(config), factory, credentials, stager),
            ledger: Arc::new(ledger),
            max_parallel_tables: usize::from(config.max_parallel_tables).max(1),
        }
    }

    pub fn with_runner(
        runner: TableRunner<F, C, S>,
        ledger: L,
        max_parallel_tables: usize,
    ) -> Self {
        register_metrics();

        Self {
            runner,
            ledger: Arc::new(ledger),
            max_parallel_tables: max_parallel_tables.max(1),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Runs every table of `jobs` and returns their stats in alias order.
    ///
    /// Exactly one [`RunStats`] is written to the ledger per table, whatever
    /// the outcome.
    pub async fn run(&self, jobs: &JobFile) -> PipelineReport {
        let resolved = jobs.resolve();
        info!(
            tables = resolved.len(),
            max_parallel_tables = self.max_parallel_tables,
            "starting ingestion"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_parallel_tables));
        let mut join_set = JoinSet::new();
        let mut pending = HashMap::new();
        let mut slots: Vec<Option<RunStats>> = vec![None; resolved.len()];
        let mut claimed = HashSet::new();

        for (index, (alias, spec)) in resolved.into_iter().enumerate() {
            let spec = spec
                .map_err(|err| ingest_error!(ErrorKind::ConfigError, "Invalid table job", err))
                .and_then(|spec| self.claim_paths(&mut claimed, spec));
            let spec = match spec {
                Ok(spec) => spec,
                Err(err) => {
                    let stats = RunRecorder::start(TableIdentity::unresolved(&alias), None)
                        .finish_with(RunStatus::Unsuccessful, Some(&err), RunCounters::default());
                    error!(alias, error = %err, "skipping invalid table job");
                    record_run(self.ledger.as_ref(), &stats).await;
                    slots[index] = Some(stats);
                    continue;
                }
            };

            // Permits are taken in alias order, so tables start in that order.
            let fallback =
                RunRecorder::start(TableIdentity::from_spec(&spec), Some(spec.load_type));
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    let err = ingest_error!(
                        ErrorKind::Unknown,
                        "Failed to acquire a table run permit",
                        err
                    );
                    let stats = fallback.finish_with(
                        RunStatus::Unsuccessful,
                        Some(&err),
                        RunCounters::default(),
                    );
                    record_run(self.ledger.as_ref(), &stats).await;
                    slots[index] = Some(stats);
                    continue;
                }
            };

            let runner = self.runner.clone();
            let ledger = self.ledger.clone();
            let handle = join_set.spawn(async move {
                let _permit = permit;
                let stats = runner.run(&spec).await;
                record_run(ledger.as_ref(), &stats).await;
                stats
            });
            pending.insert(handle.id(), (index, fallback));
        }

        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, stats)) => {
                    if let Some((index, _)) = pending.remove(&id) {
                        slots[index] = Some(stats);
                    }
                }
                Err(join_error) => {
                    let Some((index, fallback)) = pending.remove(&join_error.id()) else {
                        continue;
                    };

                    let err = table_task_error(&join_error);
                    let stats = fallback.finish_with(
                        RunStatus::Unsuccessful,
                        Some(&err),
                        RunCounters::default(),
                    );
                    error!(
                        alias = %stats.identity.alias,
                        error = %err,
                        "table run task did not complete"
                    );
                    record_run(self.ledger.as_ref(), &stats).await;
                    slots[index] = Some(stats);
                }
            }
        }

        let report = PipelineReport {
            runs: slots.into_iter().flatten().collect(),
        };
        info!(
            tables = report.runs.len(),
            failed = report.failed(),
            "finished ingestion"
        );

        report
    }

    /// Reserves the data locations of `spec` for this run.
    ///
    /// Two runs sharing a directory or a prefix would delete each other's
    /// files, so the first alias keeps the locations and later ones fail.
    fn claim_paths(
        &self,
        claimed: &mut HashSet<String>,
        spec: TableJobSpec,
    ) -> Result<TableJobSpec, IngestError> {
        let settings = self.runner.settings();
        let paths = TablePaths::derive(&spec, &settings.data_root, &settings.scripts_root);
        let staging_free = claimed.insert(paths.staging_prefix.clone());
        let local_free = claimed.insert(paths.local_dir.display().to_string());
        if !(staging_free && local_free) {
            return Err(ingest_error!(
                ErrorKind::ConfigError,
                "Table job shares its data locations with another table job",
                format!("{}: {}", spec.alias, paths.staging_prefix)
            ));
        }

        Ok(spec)
    }
}

fn table_task_error(join_error: &tokio::task::JoinError) -> IngestError {
    if join_error.is_panic() {
        ingest_error!(ErrorKind::TableTaskPanic, "Table run panicked", join_error)
    } else {
        ingest_error!(ErrorKind::TableTaskPanic, "Table run was cancelled", join_error)
    }
}

/// Writes `stats` to the ledger, logging instead of failing.
async fn record_run<L: RunLedger>(ledger: &L, stats: &RunStats) {
    if let Err(err) = ledger.write(stats).await {
        let err = if err.kind() == ErrorKind::LedgerWriteFailed {
            err
        } else {
            ingest_error!(ErrorKind::LedgerWriteFailed, "Failed to write run stats", err)
        };
        error!(
            alias = %stats.identity.alias,
            status = %stats.status,
            error = %err,
            "could not record table run"
        );
    }
}
