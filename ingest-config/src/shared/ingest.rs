use serde::Deserialize;
use std::path::PathBuf;

use crate::shared::{
    BatchConfig, CredentialsConfig, LedgerConfig, RestSourceConfig, StagerConfig,
    ValidationError,
};

/// Complete configuration of an ingestion run.
///
/// Loaded once from `configuration/*.yaml` and `APP_*` variables; the table jobs
/// themselves live in a separate [`JobFile`](crate::shared::JobFile).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IngestConfig {
    pub stager: StagerConfig,
    /// Root of the local working directories.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// Root of the merge and soft delete scripts.
    #[serde(default = "default_scripts_root")]
    pub scripts_root: PathBuf,
    #[serde(default)]
    pub batch: BatchConfig,
    /// Maximum number of tables ingested at the same time.
    #[serde(default = "default_max_parallel_tables")]
    pub max_parallel_tables: u16,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub source: RestSourceConfig,
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_scripts_root() -> PathBuf {
    PathBuf::from("sql_scripts")
}

fn default_max_parallel_tables() -> u16 {
    1
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch.max_files == 0 {
            return Err(ValidationError::BatchMaxFilesZero);
        }

        if self.max_parallel_tables == 0 {
            return Err(ValidationError::MaxParallelTablesZero);
        }

        if let StagerConfig::S3 { bucket, .. } = &self.stager
            && bucket.trim().is_empty()
        {
            return Err(ValidationError::EmptyBucket);
        }

        if let LedgerConfig::Warehouse { table, .. } = &self.ledger
            && table.trim().is_empty()
        {
            return Err(ValidationError::EmptyLedgerTable);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Environment, load_config_from};
    use std::fs;

    fn write_base(dir: &std::path::Path, body: &str) {
        fs::write(dir.join("base.yaml"), body).unwrap();
    }

    #[test]
    fn loads_defaults_from_minimal_base_file() {
        let dir = tempfile::tempdir().unwrap();
        write_base(
            dir.path(),
            "stager:\n  s3:\n    bucket: landing\n",
        );

        let config: IngestConfig = load_config_from(dir.path(), Environment::Dev).unwrap();

        assert_eq!(config.batch, BatchConfig::default());
        assert_eq!(config.max_parallel_tables, 1);
        assert_eq!(config.data_root, PathBuf::from("data"));
        assert!(matches!(config.ledger, LedgerConfig::Memory));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn environment_file_overrides_base_file() {
        let dir = tempfile::tempdir().unwrap();
        write_base(
            dir.path(),
            "stager: memory\nbatch:\n  max_files: 10\n",
        );
        fs::write(dir.path().join("staging.yaml"), "batch:\n  max_files: 2\n").unwrap();

        let config: IngestConfig = load_config_from(dir.path(), Environment::Staging).unwrap();

        assert_eq!(config.batch.max_files, 2);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_base(dir.path(), "stager: memory\nbatch:\n  max_files: 0\n");

        let config: IngestConfig = load_config_from(dir.path(), Environment::Dev).unwrap();

        assert_eq!(config.validate(), Err(ValidationError::BatchMaxFilesZero));
    }

    #[test]
    fn empty_bucket_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_base(dir.path(), "stager:\n  s3:\n    bucket: ''\n");

        let config: IngestConfig = load_config_from(dir.path(), Environment::Dev).unwrap();

        assert_eq!(config.validate(), Err(ValidationError::EmptyBucket));
    }
}
