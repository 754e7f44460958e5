//! Logging setup shared by the ingestion binaries and tests.

mod logging;

pub use logging::*;
