use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::IngestResult;
use crate::stager::memory::MemoryStager;
use crate::test_utils::memory_warehouse::MemoryWarehouse;
use crate::types::Cell;
use crate::warehouse::Warehouse;

/// Warehouse whose merge scripts upsert the staged rows into an in-memory
/// table keyed by the first column.
///
/// The merge is applied before the wrapped [`MemoryWarehouse`] gets a chance
/// to fail, modelling a merge that committed but reported an error.
#[derive(Debug, Clone)]
pub struct UpsertWarehouse {
    stager: MemoryStager,
    staging_prefix: String,
    rows: Arc<Mutex<BTreeMap<String, String>>>,
    wrapped_warehouse: MemoryWarehouse,
}

impl UpsertWarehouse {
    pub fn new(
        stager: MemoryStager,
        staging_prefix: impl Into<String>,
        warehouse: MemoryWarehouse,
    ) -> Self {
        Self {
            stager,
            staging_prefix: staging_prefix.into(),
            rows: Arc::new(Mutex::new(BTreeMap::new())),
            wrapped_warehouse: warehouse,
        }
    }

    pub fn inner(&self) -> &MemoryWarehouse {
        &self.wrapped_warehouse
    }

    /// Rows of the target table, keyed by their first column.
    pub async fn rows(&self) -> BTreeMap<String, String> {
        self.rows.lock().await.clone()
    }

    async fn merge_staged(&self) {
        let mut rows = self.rows.lock().await;
        for key in self.stager.keys(&self.staging_prefix).await {
            let Some(content) = self.stager.object(&key).await else {
                continue;
            };
            for line in String::from_utf8_lossy(&content).lines() {
                let id = line.split('\t').next().unwrap_or_default().to_owned();
                rows.insert(id, line.to_owned());
            }
        }
    }
}

impl Warehouse for UpsertWarehouse {
    async fn truncate(&self, qualified_table: &str) -> IngestResult<()> {
        self.wrapped_warehouse.truncate(qualified_table).await?;
        self.rows.lock().await.clear();

        Ok(())
    }

    async fn execute_script(&self, script: &Path) -> IngestResult<()> {
        if !script.to_string_lossy().contains("soft_delete") {
            self.merge_staged().await;
        }

        self.wrapped_warehouse.execute_script(script).await
    }

    async fn insert_row(
        &self,
        qualified_table: &str,
        columns: &[(&str, Cell)],
    ) -> IngestResult<()> {
        self.wrapped_warehouse
            .insert_row(qualified_table, columns)
            .await
    }
}
