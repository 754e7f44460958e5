//! Collaborators and fixtures for testing table runs without external systems.
//!
//! Every memory collaborator can report to a shared [`timeline::Timeline`], which
//! lets tests assert on the relative order of source, stager and warehouse
//! operations across a run.
pub mod connectors;
pub mod fixtures;
pub mod memory_source;
pub mod memory_warehouse;
pub mod test_stager_wrapper;
pub mod timeline;
pub mod upsert_warehouse;
