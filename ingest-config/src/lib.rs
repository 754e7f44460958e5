//! Configuration management for the ingestion runner.
//!
//! Provides environment detection, hierarchical configuration loading from YAML
//! files and environment variables, the table job file format, secret handling
//! and the shared configuration types consumed by the `ingest` crate.

mod environment;
mod load;
mod secret;
pub mod shared;

pub use environment::*;
pub use load::*;
pub use secret::*;
