use std::future::Future;

use ingest_config::shared::TableJobSpec;

use crate::credentials::Credentials;
use crate::error::IngestResult;
use crate::source::Source;
use crate::warehouse::Warehouse;

/// Builds the per-table source and warehouse clients from their credentials.
pub trait ConnectorFactory {
    type Source: Source + Send + Sync;
    type Warehouse: Warehouse + Send + Sync;

    fn source(
        &self,
        spec: &TableJobSpec,
        credentials: &Credentials,
    ) -> impl Future<Output = IngestResult<Self::Source>> + Send;

    fn warehouse(
        &self,
        spec: &TableJobSpec,
        credentials: &Credentials,
    ) -> impl Future<Output = IngestResult<Self::Warehouse>> + Send;
}
