//! Paginated API ingestion into a warehouse through object storage staging.
//!
//! A run ingests every table of a job file. For each table the
//! [`pipeline::TableRunner`] fetches pages from a [`source::Source`], writes one
//! delimited file per page with the [`writer::BatchWriter`], and periodically
//! flushes the pending files: they are uploaded by a [`stager::Stager`], merged
//! into the target by a script run on a [`warehouse::Warehouse`], and archived.
//! Each table run ends with exactly one [`types::RunStats`] record written to a
//! [`ledger::RunLedger`].
//!
//! Three load types are supported: `reload` truncates the target before the
//! first fetch, `full_load` and `incremental_load` leave the target as is and
//! rely on their merge script. A soft delete script can run once after a fully
//! extracted table.

pub mod credentials;
pub mod error;
pub mod ledger;
mod macros;
pub mod metrics;
pub mod paths;
pub mod pipeline;
pub mod source;
pub mod stager;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod warehouse;
pub mod writer;
