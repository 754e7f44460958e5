//! Concrete collaborators selected by configuration.
//!
//! The ingest traits are statically dispatched, so each configurable choice is
//! an enum forwarding to the selected implementation.

use std::path::Path;

use ingest::credentials::memory::MemoryCredentialProvider;
use ingest::credentials::ssm::SsmCredentialProvider;
use ingest::credentials::{CredentialProvider, Credentials};
use ingest::error::IngestResult;
use ingest::ledger::RunLedger;
use ingest::ledger::memory::MemoryLedger;
use ingest::ledger::warehouse::WarehouseLedger;
use ingest::pipeline::ConnectorFactory;
use ingest::source::rest::RestSource;
use ingest::stager::Stager;
use ingest::stager::memory::MemoryStager;
use ingest::stager::s3::S3Stager;
use ingest::types::RunStats;
use ingest::warehouse::postgres::PostgresWarehouse;
use ingest_config::shared::{RestSourceConfig, TableJobSpec};

#[derive(Debug, Clone)]
pub enum AnyStager {
    Memory(MemoryStager),
    S3(S3Stager),
}

impl Stager for AnyStager {
    async fn upload_directory(&self, local_dir: &Path, prefix: &str) -> IngestResult<usize> {
        match self {
            Self::Memory(stager) => stager.upload_directory(local_dir, prefix).await,
            Self::S3(stager) => stager.upload_directory(local_dir, prefix).await,
        }
    }

    async fn archive(&self, prefix: &str, processed_prefix: &str) -> IngestResult<usize> {
        match self {
            Self::Memory(stager) => stager.archive(prefix, processed_prefix).await,
            Self::S3(stager) => stager.archive(prefix, processed_prefix).await,
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> IngestResult<usize> {
        match self {
            Self::Memory(stager) => stager.delete_prefix(prefix).await,
            Self::S3(stager) => stager.delete_prefix(prefix).await,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AnyCredentialProvider {
    Memory(MemoryCredentialProvider),
    Ssm(SsmCredentialProvider),
}

impl CredentialProvider for AnyCredentialProvider {
    async fn get(&self, key: &str) -> IngestResult<Credentials> {
        match self {
            Self::Memory(provider) => provider.get(key).await,
            Self::Ssm(provider) => provider.get(key).await,
        }
    }
}

#[derive(Debug)]
pub enum AnyLedger {
    Memory(MemoryLedger),
    Warehouse(WarehouseLedger<PostgresWarehouse>),
}

impl RunLedger for AnyLedger {
    async fn write(&self, stats: &RunStats) -> IngestResult<()> {
        match self {
            Self::Memory(ledger) => ledger.write(stats).await,
            Self::Warehouse(ledger) => ledger.write(stats).await,
        }
    }
}

/// Connects every table to a REST source and a Postgres-protocol warehouse.
#[derive(Debug, Clone)]
pub struct LiveConnectors {
    source_config: RestSourceConfig,
}

impl LiveConnectors {
    pub fn new(source_config: RestSourceConfig) -> Self {
        Self { source_config }
    }
}

impl ConnectorFactory for LiveConnectors {
    type Source = RestSource;
    type Warehouse = PostgresWarehouse;

    async fn source(
        &self,
        _spec: &TableJobSpec,
        credentials: &Credentials,
    ) -> IngestResult<Self::Source> {
        RestSource::from_credentials(credentials, self.source_config.clone())
    }

    async fn warehouse(
        &self,
        _spec: &TableJobSpec,
        credentials: &Credentials,
    ) -> IngestResult<Self::Warehouse> {
        PostgresWarehouse::connect(credentials).await
    }
}
