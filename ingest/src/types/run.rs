use chrono::{DateTime, Utc};
use ingest_config::shared::{LoadType, TableJobSpec};
use std::fmt;
use std::time::Instant;

use crate::error::{ErrorKind, IngestError};
use crate::types::Cell;

/// Identity of the target table of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentity {
    pub alias: String,
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl TableIdentity {
    pub fn from_spec(spec: &TableJobSpec) -> Self {
        Self {
            alias: spec.alias.clone(),
            database: spec.target.database.clone(),
            schema: spec.target.schema.clone(),
            table: spec.target.table.clone(),
        }
    }

    /// Identity of a table whose job could not be resolved; only the alias is known.
    pub fn unresolved(alias: &str) -> Self {
        Self {
            alias: alias.to_owned(),
            database: String::new(),
            schema: String::new(),
            table: String::new(),
        }
    }

    /// Returns `DATABASE.SCHEMA.TABLE`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.table)
    }
}

impl fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.table.is_empty() {
            f.write_str(&self.alias)
        } else {
            f.write_str(&self.qualified_name())
        }
    }
}

/// Final outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Successful,
    Unsuccessful,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Successful => "SUCCESSFUL",
            RunStatus::Unsuccessful => "UNSUCCESSFUL",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress counters reported with a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub pages: u64,
    pub records: u64,
    pub flushes: u64,
}

/// Auditable record of one table run, written once to the run ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub identity: TableIdentity,
    pub load_type: Option<LoadType>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub status: RunStatus,
    pub error: Option<String>,
    /// Kind of the failure, not persisted in the ledger row.
    pub error_kind: Option<ErrorKind>,
    pub counters: RunCounters,
}

impl RunStats {
    pub fn is_successful(&self) -> bool {
        self.status == RunStatus::Successful
    }

    /// Returns the ledger row for these stats, in column order.
    pub fn to_columns(&self) -> Vec<(&'static str, Cell)> {
        vec![
            ("alias", Cell::String(self.identity.alias.clone())),
            ("db_name", Cell::String(self.identity.database.clone())),
            ("schema_name", Cell::String(self.identity.schema.clone())),
            ("table_name", Cell::String(self.identity.table.clone())),
            (
                "load_type",
                self.load_type
                    .map(|load_type| Cell::String(load_type.to_string()))
                    .unwrap_or(Cell::Null),
            ),
            ("started_at", Cell::Timestamp(self.started_at)),
            ("ended_at", Cell::Timestamp(self.ended_at)),
            ("elapsed_ms", Cell::I64(self.elapsed_ms as i64)),
            ("status", Cell::String(self.status.to_string())),
            (
                "error",
                self.error.clone().map(Cell::String).unwrap_or(Cell::Null),
            ),
            ("pages", Cell::I64(self.counters.pages as i64)),
            ("records", Cell::I64(self.counters.records as i64)),
            ("flushes", Cell::I64(self.counters.flushes as i64)),
        ]
    }
}

/// Captures the start of a run and produces its [`RunStats`] exactly once.
///
/// [`RunRecorder::finish`] consumes the recorder, so a run cannot be finalized
/// twice. The end timestamp is derived from a monotonic clock, which keeps
/// `ended_at >= started_at` even if the wall clock jumps.
#[derive(Debug)]
pub struct RunRecorder {
    identity: TableIdentity,
    load_type: Option<LoadType>,
    started_at: DateTime<Utc>,
    start: Instant,
}

impl RunRecorder {
    pub fn start(identity: TableIdentity, load_type: Option<LoadType>) -> Self {
        Self {
            identity,
            load_type,
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    pub fn finish<T>(self, result: &Result<T, IngestError>, counters: RunCounters) -> RunStats {
        match result {
            Ok(_) => self.finish_with(RunStatus::Successful, None, counters),
            Err(err) => self.finish_with(RunStatus::Unsuccessful, Some(err), counters),
        }
    }

    pub fn finish_with(
        self,
        status: RunStatus,
        error: Option<&IngestError>,
        counters: RunCounters,
    ) -> RunStats {
        let elapsed = self.start.elapsed();
        let ended_at = self.started_at
            + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero());

        RunStats {
            identity: self.identity,
            load_type: self.load_type,
            started_at: self.started_at,
            ended_at,
            elapsed_ms: elapsed.as_millis() as u64,
            status,
            error: error.map(ToString::to_string),
            error_kind: error.map(IngestError::kind),
            counters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest_error;

    fn identity() -> TableIdentity {
        TableIdentity {
            alias: "orders".to_owned(),
            database: "RAW".to_owned(),
            schema: "SHOP".to_owned(),
            table: "ORDERS".to_owned(),
        }
    }

    #[test]
    fn qualified_name_joins_parts_with_dots() {
        assert_eq!(identity().qualified_name(), "RAW.SHOP.ORDERS");
        assert_eq!(TableIdentity::unresolved("broken").to_string(), "broken");
    }

    #[test]
    fn successful_result_finishes_without_error() {
        let recorder = RunRecorder::start(identity(), Some(LoadType::Reload));
        let stats = recorder.finish(&Ok::<(), IngestError>(()), RunCounters::default());

        assert_eq!(stats.status, RunStatus::Successful);
        assert!(stats.error.is_none());
        assert!(stats.ended_at >= stats.started_at);
    }

    #[test]
    fn failed_result_keeps_error_text() {
        let recorder = RunRecorder::start(identity(), None);
        let result: Result<(), IngestError> =
            Err(ingest_error!(ErrorKind::TruncateFailed, "Truncate failed"));
        let stats = recorder.finish(&result, RunCounters::default());

        assert_eq!(stats.status, RunStatus::Unsuccessful);
        assert_eq!(
            stats.error.as_deref(),
            Some("TruncateFailed: Truncate failed")
        );
        assert_eq!(stats.error_kind, Some(ErrorKind::TruncateFailed));
    }

    #[test]
    fn ledger_columns_render_null_error_for_success() {
        let stats = RunRecorder::start(identity(), Some(LoadType::FullLoad))
            .finish(&Ok::<(), IngestError>(()), RunCounters::default());
        let columns = stats.to_columns();

        let error = columns.iter().find(|(name, _)| *name == "error").unwrap();
        assert_eq!(error.1, Cell::Null);
        let status = columns.iter().find(|(name, _)| *name == "status").unwrap();
        assert_eq!(status.1, Cell::String("SUCCESSFUL".to_owned()));
    }
}
