use ingest::credentials::memory::MemoryCredentialProvider;
use ingest::credentials::ssm::SsmCredentialProvider;
use ingest::credentials::{CredentialProvider, Credentials};
use ingest::ledger::memory::MemoryLedger;
use ingest::ledger::warehouse::WarehouseLedger;
use ingest::pipeline::{IngestPipeline, PipelineReport};
use ingest::stager::memory::MemoryStager;
use ingest::stager::s3::S3Stager;
use ingest::warehouse::postgres::PostgresWarehouse;
use ingest_config::shared::{
    BatchConfig, CredentialsConfig, IngestConfig, JobFile, LedgerConfig, RestSourceConfig,
    StagerConfig,
};
use tracing::{debug, info, warn};

use crate::collaborators::{AnyCredentialProvider, AnyLedger, AnyStager, LiveConnectors};

/// Builds the configured collaborators and ingests every table of `jobs`.
///
/// Only failures to set up shared collaborators are returned as errors; table
/// failures are part of the returned report.
pub async fn start_ingestion_with_config(
    config: IngestConfig,
    jobs: JobFile,
) -> anyhow::Result<PipelineReport> {
    info!("starting ingestion service");

    log_config(&config);

    let credentials = init_credentials(&config.credentials).await;
    let stager = init_stager(&config.stager).await;
    let ledger = init_ledger(&config.ledger, &credentials).await?;
    let connectors = LiveConnectors::new(config.source.clone());

    let pipeline = IngestPipeline::new(&config, connectors, credentials, stager, ledger);
    let report = pipeline.run(&jobs).await;

    info!("ingestion service completed");

    Ok(report)
}

async fn init_credentials(config: &CredentialsConfig) -> AnyCredentialProvider {
    match config {
        CredentialsConfig::Ssm { region } => {
            AnyCredentialProvider::Ssm(SsmCredentialProvider::new(region.clone()).await)
        }
        CredentialsConfig::Memory { entries } => {
            let entries = entries
                .iter()
                .map(|(key, values)| (key.clone(), Credentials::new(values.clone())))
                .collect();

            AnyCredentialProvider::Memory(MemoryCredentialProvider::from_entries(entries))
        }
    }
}

async fn init_stager(config: &StagerConfig) -> AnyStager {
    match config {
        StagerConfig::Memory => {
            warn!("using in-memory staging, staged files are lost when the process exits");
            AnyStager::Memory(MemoryStager::new())
        }
        StagerConfig::S3 {
            bucket,
            region,
            key_root,
        } => AnyStager::S3(S3Stager::new(bucket.clone(), region.clone(), key_root.clone()).await),
    }
}

/// Connects the ledger warehouse with the credentials stored under its key.
async fn init_ledger(
    config: &LedgerConfig,
    credentials: &AnyCredentialProvider,
) -> anyhow::Result<AnyLedger> {
    match config {
        LedgerConfig::Memory => Ok(AnyLedger::Memory(MemoryLedger::new())),
        LedgerConfig::Warehouse {
            credentials_key,
            table,
        } => {
            let ledger_credentials = credentials.get(credentials_key).await?;
            let warehouse = PostgresWarehouse::connect(&ledger_credentials).await?;

            Ok(AnyLedger::Warehouse(WarehouseLedger::new(
                warehouse,
                table.clone(),
            )))
        }
    }
}

fn log_config(config: &IngestConfig) {
    debug!(
        data_root = %config.data_root.display(),
        scripts_root = %config.scripts_root.display(),
        max_parallel_tables = config.max_parallel_tables,
        "ingestion config"
    );
    log_stager_config(&config.stager);
    log_batch_config(&config.batch);
    log_ledger_config(&config.ledger);
    log_source_config(&config.source);
}

fn log_stager_config(config: &StagerConfig) {
    match config {
        StagerConfig::Memory => {
            debug!("using memory stager config");
        }
        StagerConfig::S3 {
            bucket,
            region,
            key_root,
        } => {
            debug!(bucket, ?region, ?key_root, "using s3 stager config");
        }
    }
}

fn log_batch_config(config: &BatchConfig) {
    debug!(max_files = config.max_files, "batch config");
}

fn log_ledger_config(config: &LedgerConfig) {
    match config {
        LedgerConfig::Memory => {
            debug!("using memory ledger config");
        }
        LedgerConfig::Warehouse {
            credentials_key,
            table,
        } => {
            debug!(credentials_key, table, "using warehouse ledger config");
        }
    }
}

fn log_source_config(config: &RestSourceConfig) {
    debug!(
        page_size = config.page_size,
        cursor_param = config.cursor_param,
        records_pointer = config.records_pointer,
        next_cursor_pointer = config.next_cursor_pointer,
        timeout_secs = config.timeout_secs,
        "rest source config"
    );
}
