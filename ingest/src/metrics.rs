use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

static REGISTER_METRICS: Once = Once::new();

pub const INGEST_PAGES_FETCHED_TOTAL: &str = "ingest_pages_fetched_total";
pub const INGEST_RECORDS_FETCHED_TOTAL: &str = "ingest_records_fetched_total";
pub const INGEST_FLUSHES_TOTAL: &str = "ingest_flushes_total";
pub const INGEST_FLUSH_DURATION_SECONDS: &str = "ingest_flush_duration_seconds";
pub const INGEST_TABLE_RUNS_TOTAL: &str = "ingest_table_runs_total";
pub const TABLE: &str = "table";
pub const STATUS: &str = "status";

/// Describes the metrics emitted by the ingestion pipeline.
///
/// Safe to call many times; the descriptions are registered only once.
pub(crate) fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            INGEST_PAGES_FETCHED_TOTAL,
            Unit::Count,
            "Total number of pages fetched from source APIs"
        );

        describe_counter!(
            INGEST_RECORDS_FETCHED_TOTAL,
            Unit::Count,
            "Total number of records fetched from source APIs"
        );

        describe_counter!(
            INGEST_FLUSHES_TOTAL,
            Unit::Count,
            "Total number of batches pushed to staging and merged into a target"
        );

        describe_histogram!(
            INGEST_FLUSH_DURATION_SECONDS,
            Unit::Seconds,
            "Time taken to upload, merge and archive one batch"
        );

        describe_counter!(
            INGEST_TABLE_RUNS_TOTAL,
            Unit::Count,
            "Total number of table runs by final status"
        );
    });
}
