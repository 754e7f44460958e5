use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::shared::ValidationError;

/// Key of the global load type default and of the per-table override.
const LOAD_TYPE_KEY: &str = "Load Type";

/// How a run affects its target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadType {
    /// Truncate the target, then load everything.
    Reload,
    /// Load everything without truncating.
    FullLoad,
    /// Append or merge only new data.
    IncrementalLoad,
}

impl LoadType {
    /// Directory name used in local data and script paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadType::Reload => "reload",
            LoadType::FullLoad => "full_load",
            LoadType::IncrementalLoad => "incremental_load",
        }
    }
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source half of a table job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSpec {
    pub platform: String,
    pub table: String,
    /// Endpoint requested for every page. Defaults to the source table name.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Target half of a table job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetSpec {
    pub platform: String,
    pub database: String,
    pub schema: String,
    pub table: String,
}

/// Immutable configuration of a single table ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableJobSpec {
    /// Key of the table in the job file.
    pub alias: String,
    /// Namespace used for credential keys and local/remote paths.
    pub environment: String,
    pub source: SourceSpec,
    pub target: TargetSpec,
    pub load_type: LoadType,
    pub soft_delete: bool,
}

impl TableJobSpec {
    /// Endpoint requested from the source API.
    pub fn endpoint(&self) -> &str {
        self.source.endpoint.as_deref().unwrap_or(&self.source.table)
    }
}

#[derive(Debug, Deserialize)]
struct RawTableJob {
    #[serde(rename = "Environment")]
    environment: String,
    #[serde(rename = "Source")]
    source: SourceSpec,
    #[serde(rename = "Target")]
    target: TargetSpec,
    #[serde(rename = "Load Type", default)]
    load_type: Option<LoadType>,
    #[serde(rename = "Soft Delete", default)]
    soft_delete: bool,
}

/// Errors raised while reading a job file as a whole.
#[derive(Debug, Error)]
pub enum JobFileError {
    #[error("failed to read job file `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse job file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("job file is not a mapping of table aliases")]
    NotAMapping,
}

/// Errors that make a single table job unusable.
///
/// These never abort the other tables of the same file.
#[derive(Debug, Error)]
pub enum TableJobError {
    #[error("invalid definition for table `{alias}`: {source}")]
    Parse {
        alias: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Table jobs of one invocation, keyed by alias.
///
/// Table definitions are kept as raw YAML until [`JobFile::resolve`] so that a
/// malformed table only fails itself.
#[derive(Debug, Clone)]
pub struct JobFile {
    default_load_type: Option<LoadType>,
    tables: BTreeMap<String, serde_yaml::Value>,
}

impl JobFile {
    pub fn from_path(path: &Path) -> Result<Self, JobFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| JobFileError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, JobFileError> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        let serde_yaml::Value::Mapping(mapping) = value else {
            return Err(JobFileError::NotAMapping);
        };

        let mut default_load_type = None;
        let mut tables = BTreeMap::new();
        for (key, value) in mapping {
            let Some(key) = key.as_str() else {
                return Err(JobFileError::NotAMapping);
            };

            if key == LOAD_TYPE_KEY {
                default_load_type = Some(serde_yaml::from_value(value)?);
            } else {
                tables.insert(key.to_owned(), value);
            }
        }

        Ok(Self {
            default_load_type,
            tables,
        })
    }

    pub fn default_load_type(&self) -> Option<LoadType> {
        self.default_load_type
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Resolves every table job in alias order.
    pub fn resolve(&self) -> Vec<(String, Result<TableJobSpec, TableJobError>)> {
        self.tables
            .iter()
            .map(|(alias, value)| (alias.clone(), self.resolve_table(alias, value)))
            .collect()
    }

    fn resolve_table(
        &self,
        alias: &str,
        value: &serde_yaml::Value,
    ) -> Result<TableJobSpec, TableJobError> {
        let raw: RawTableJob =
            serde_yaml::from_value(value.clone()).map_err(|source| TableJobError::Parse {
                alias: alias.to_owned(),
                source,
            })?;

        let load_type = raw
            .load_type
            .or(self.default_load_type)
            .ok_or_else(|| ValidationError::MissingLoadType(alias.to_owned()))?;

        let spec = TableJobSpec {
            alias: alias.to_owned(),
            environment: raw.environment,
            source: raw.source,
            target: raw.target,
            load_type,
            soft_delete: raw.soft_delete,
        };
        validate_spec(&spec)?;

        Ok(spec)
    }
}

fn validate_spec(spec: &TableJobSpec) -> Result<(), ValidationError> {
    let fields = [
        ("Environment", &spec.environment),
        ("Source.platform", &spec.source.platform),
        ("Source.table", &spec.source.table),
        ("Target.platform", &spec.target.platform),
        ("Target.database", &spec.target.database),
        ("Target.schema", &spec.target.schema),
        ("Target.table", &spec.target.table),
    ];

    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                alias: spec.alias.clone(),
                field,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOBS: &str = r#"
Load Type: incremental_load
orders:
  Environment: prod
  Source:
    platform: Shop API
    table: orders
  Target:
    platform: warehouse
    database: RAW
    schema: SHOP
    table: ORDERS
customers:
  Environment: prod
  Source:
    platform: Shop API
    table: customers
    endpoint: /v2/customers
  Target:
    platform: warehouse
    database: RAW
    schema: SHOP
    table: CUSTOMERS
  Load Type: reload
  Soft Delete: true
"#;

    #[test]
    fn tables_inherit_the_global_load_type() {
        let jobs = JobFile::parse(JOBS).unwrap();
        assert_eq!(jobs.default_load_type(), Some(LoadType::IncrementalLoad));

        let resolved = jobs.resolve();
        assert_eq!(resolved.len(), 2);

        // Aliases are resolved in sorted order.
        let (alias, customers) = &resolved[0];
        assert_eq!(alias, "customers");
        let customers = customers.as_ref().unwrap();
        assert_eq!(customers.load_type, LoadType::Reload);
        assert!(customers.soft_delete);
        assert_eq!(customers.endpoint(), "/v2/customers");

        let orders = resolved[1].1.as_ref().unwrap();
        assert_eq!(orders.load_type, LoadType::IncrementalLoad);
        assert!(!orders.soft_delete);
        assert_eq!(orders.endpoint(), "orders");
    }

    #[test]
    fn missing_load_type_only_fails_that_table() {
        let jobs = JobFile::parse(
            r#"
good:
  Environment: dev
  Source: { platform: api, table: a }
  Target: { platform: wh, database: D, schema: S, table: A }
  Load Type: full_load
bad:
  Environment: dev
  Source: { platform: api, table: b }
  Target: { platform: wh, database: D, schema: S, table: B }
"#,
        )
        .unwrap();

        let resolved = jobs.resolve();
        let bad = resolved.iter().find(|(alias, _)| alias == "bad").unwrap();
        assert!(matches!(
            bad.1,
            Err(TableJobError::Invalid(ValidationError::MissingLoadType(_)))
        ));

        let good = resolved.iter().find(|(alias, _)| alias == "good").unwrap();
        assert!(good.1.is_ok());
    }

    #[test]
    fn malformed_table_is_isolated() {
        let jobs = JobFile::parse(
            r#"
Load Type: reload
broken:
  Environment: dev
  Source: { platform: api }
ok:
  Environment: dev
  Source: { platform: api, table: a }
  Target: { platform: wh, database: D, schema: S, table: A }
"#,
        )
        .unwrap();

        let resolved = jobs.resolve();
        assert!(matches!(resolved[0].1, Err(TableJobError::Parse { .. })));
        assert!(resolved[1].1.is_ok());
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let jobs = JobFile::parse(
            r#"
t:
  Environment: dev
  Source: { platform: api, table: a }
  Target: { platform: wh, database: '', schema: S, table: A }
  Load Type: reload
"#,
        )
        .unwrap();

        let resolved = jobs.resolve();
        assert!(matches!(
            resolved[0].1,
            Err(TableJobError::Invalid(ValidationError::EmptyField {
                field: "Target.database",
                ..
            }))
        ));
    }

    #[test]
    fn non_mapping_file_is_rejected() {
        assert!(matches!(
            JobFile::parse("- a\n- b\n"),
            Err(JobFileError::NotAMapping)
        ));
    }
}
