use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Batch size cannot be zero.
    #[error("`batch.max_files` cannot be zero")]
    BatchMaxFilesZero,
    /// At least one table must be allowed to run.
    #[error("`max_parallel_tables` cannot be zero")]
    MaxParallelTablesZero,
    /// The S3 bucket name is empty.
    #[error("`stager.s3.bucket` cannot be empty")]
    EmptyBucket,
    /// The ledger table name is empty.
    #[error("`ledger.warehouse.table` cannot be empty")]
    EmptyLedgerTable,
    /// A table job has no load type and there is no global default.
    #[error("table `{0}` has no `Load Type` and no global default is set")]
    MissingLoadType(String),
    /// A required table job field is empty.
    #[error("table `{alias}` has an empty `{field}`")]
    EmptyField { alias: String, field: &'static str },
}
