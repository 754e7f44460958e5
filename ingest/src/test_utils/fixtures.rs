use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

use ingest_config::shared::{JobFile, LoadType, SourceSpec, TableJobSpec, TargetSpec};

use crate::credentials::memory::MemoryCredentialProvider;
use crate::credentials::{Credentials, source_credentials_key, target_credentials_key};
use crate::pipeline::RunSettings;
use crate::types::{Cell, TableRow};

pub const ENVIRONMENT: &str = "dev";
pub const SOURCE_PLATFORM: &str = "crm";
pub const TARGET_PLATFORM: &str = "warehouse";
pub const DATABASE: &str = "raw";
pub const SCHEMA: &str = "crm";

/// Spec of a table named `alias` on both sides.
pub fn table_spec(alias: &str, load_type: LoadType, soft_delete: bool) -> TableJobSpec {
    TableJobSpec {
        alias: alias.to_owned(),
        environment: ENVIRONMENT.to_owned(),
        source: SourceSpec {
            platform: SOURCE_PLATFORM.to_owned(),
            table: alias.to_owned(),
            endpoint: None,
        },
        target: TargetSpec {
            platform: TARGET_PLATFORM.to_owned(),
            database: DATABASE.to_owned(),
            schema: SCHEMA.to_owned(),
            table: alias.to_owned(),
        },
        load_type,
        soft_delete,
    }
}

/// Renders specs as a job file.
pub fn job_file(specs: &[TableJobSpec]) -> JobFile {
    let mut yaml = String::new();
    for spec in specs {
        let _ = write!(
            yaml,
            "{alias}:\n  Environment: {env}\n  Source:\n    platform: {source_platform}\n    table: {source_table}\n  Target:\n    platform: {target_platform}\n    database: {database}\n    schema: {schema}\n    table: {target_table}\n  Load Type: {load_type}\n  Soft Delete: {soft_delete}\n",
            alias = spec.alias,
            env = spec.environment,
            source_platform = spec.source.platform,
            source_table = spec.source.table,
            target_platform = spec.target.platform,
            database = spec.target.database,
            schema = spec.target.schema,
            target_table = spec.target.table,
            load_type = spec.load_type,
            soft_delete = spec.soft_delete,
        );
    }

    JobFile::parse(&yaml).expect("fixture job file must parse")
}

/// Rows `(id, "name-{id}")` for every id of `ids`.
pub fn rows(ids: std::ops::Range<i64>) -> Vec<TableRow> {
    ids.map(|id| TableRow::new(vec![Cell::I64(id), Cell::String(format!("name-{id}"))]))
        .collect()
}

/// Pages holding `sizes[n]` rows each, with increasing ids across pages.
pub fn pages(sizes: &[usize]) -> Vec<Vec<TableRow>> {
    let mut next_id = 1;
    sizes
        .iter()
        .map(|size| {
            let start = next_id;
            next_id += *size as i64;
            rows(start..next_id)
        })
        .collect()
}

/// Source and target credentials for every spec.
pub fn credentials_for(specs: &[TableJobSpec]) -> MemoryCredentialProvider {
    let mut entries = BTreeMap::new();
    for spec in specs {
        let source: Credentials = [("base_url", "http://source.test")].into_iter().collect();
        let target: Credentials = [("host", "warehouse.test"), ("user", "loader")]
            .into_iter()
            .collect();
        entries.insert(source_credentials_key(spec), source);
        entries.insert(target_credentials_key(spec), target);
    }

    MemoryCredentialProvider::from_entries(entries)
}

pub fn run_settings(root: &Path, max_files: usize) -> RunSettings {
    RunSettings {
        data_root: root.join("data"),
        scripts_root: root.join("sql_scripts"),
        max_files,
    }
}
