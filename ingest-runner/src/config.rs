use std::path::Path;

use ingest_config::load_config;
use ingest_config::shared::{IngestConfig, JobFile};

/// Loads the [`IngestConfig`] and validates it.
pub fn load_ingest_config() -> anyhow::Result<IngestConfig> {
    let config = load_config::<IngestConfig>()?;
    config.validate()?;

    Ok(config)
}

/// Reads the table jobs of this invocation.
///
/// Only a file that cannot be read or is not a mapping fails here; invalid
/// tables are reported per table by the pipeline.
pub fn load_job_file(path: &Path) -> anyhow::Result<JobFile> {
    Ok(JobFile::from_path(path)?)
}
