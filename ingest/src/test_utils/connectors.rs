use std::collections::BTreeMap;

use ingest_config::shared::TableJobSpec;

use crate::bail;
use crate::credentials::Credentials;
use crate::error::{ErrorKind, IngestResult};
use crate::pipeline::ConnectorFactory;
use crate::test_utils::memory_source::MemorySource;
use crate::warehouse::Warehouse;

/// Connector factory handing out scripted sources by alias and a shared
/// warehouse.
#[derive(Debug, Clone)]
pub struct TestConnectors<W> {
    sources: BTreeMap<String, MemorySource>,
    warehouse: W,
}

impl<W> TestConnectors<W> {
    pub fn new(warehouse: W) -> Self {
        Self {
            sources: BTreeMap::new(),
            warehouse,
        }
    }

    /// Registers the source used for `alias`. Each run gets a fresh copy.
    pub fn with_source(mut self, alias: impl Into<String>, source: MemorySource) -> Self {
        self.sources.insert(alias.into(), source);
        self
    }
}

impl<W> ConnectorFactory for TestConnectors<W>
where
    W: Warehouse + Clone + Send + Sync,
{
    type Source = MemorySource;
    type Warehouse = W;

    async fn source(
        &self,
        spec: &TableJobSpec,
        _credentials: &Credentials,
    ) -> IngestResult<Self::Source> {
        match self.sources.get(&spec.alias) {
            Some(source) => Ok(source.fresh()),
            None => bail!(
                ErrorKind::ConfigError,
                "No source registered for table",
                &spec.alias
            ),
        }
    }

    async fn warehouse(
        &self,
        _spec: &TableJobSpec,
        _credentials: &Credentials,
    ) -> IngestResult<Self::Warehouse> {
        Ok(self.warehouse.clone())
    }
}
