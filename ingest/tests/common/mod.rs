#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ingest::credentials::memory::MemoryCredentialProvider;
use ingest::ledger::memory::MemoryLedger;
use ingest::pipeline::{IngestPipeline, TableRunner};
use ingest::stager::memory::MemoryStager;
use ingest::test_utils::connectors::TestConnectors;
use ingest::test_utils::fixtures::{credentials_for, run_settings};
use ingest::test_utils::memory_source::MemorySource;
use ingest::test_utils::memory_warehouse::MemoryWarehouse;
use ingest::test_utils::test_stager_wrapper::TestStagerWrapper;
use ingest::test_utils::timeline::Timeline;
use ingest::types::TableRow;
use ingest::warehouse::Warehouse;
use ingest_config::shared::TableJobSpec;
use tempfile::TempDir;

pub type TestStager = TestStagerWrapper<MemoryStager>;
pub type TestRunner<W> = TableRunner<TestConnectors<W>, MemoryCredentialProvider, TestStager>;
pub type TestPipeline =
    IngestPipeline<TestConnectors<MemoryWarehouse>, MemoryCredentialProvider, TestStager, MemoryLedger>;

/// Memory collaborators sharing one timeline and one working directory.
pub struct Harness {
    pub dir: TempDir,
    pub timeline: Timeline,
    pub stager: TestStager,
    pub warehouse: MemoryWarehouse,
}

impl Harness {
    pub fn new() -> Self {
        let timeline = Timeline::new();

        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
            stager: TestStagerWrapper::wrap(MemoryStager::new(), timeline.clone()),
            warehouse: MemoryWarehouse::new().with_timeline(timeline.clone()),
            timeline,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Scripted source for `alias` reporting to the shared timeline.
    pub fn source(&self, alias: &str, pages: Vec<Vec<TableRow>>) -> MemorySource {
        MemorySource::new(alias, pages).with_timeline(self.timeline.clone())
    }

    pub fn runner(
        &self,
        specs: &[TableJobSpec],
        sources: Vec<MemorySource>,
        max_files: usize,
    ) -> TestRunner<MemoryWarehouse> {
        self.runner_with(
            specs,
            sources,
            max_files,
            self.warehouse.clone(),
            credentials_for(specs),
        )
    }

    pub fn runner_with<W>(
        &self,
        specs: &[TableJobSpec],
        sources: Vec<MemorySource>,
        max_files: usize,
        warehouse: W,
        credentials: MemoryCredentialProvider,
    ) -> TestRunner<W>
    where
        W: Warehouse + Clone + Send + Sync,
    {
        let connectors = specs
            .iter()
            .zip(sources)
            .fold(TestConnectors::new(warehouse), |connectors, (spec, source)| {
                connectors.with_source(spec.alias.clone(), source)
            });

        TableRunner::new(
            run_settings(self.root(), max_files),
            connectors,
            credentials,
            self.stager.clone(),
        )
    }

    pub fn pipeline(
        &self,
        specs: &[TableJobSpec],
        sources: Vec<MemorySource>,
        max_files: usize,
        max_parallel_tables: usize,
    ) -> TestPipeline {
        IngestPipeline::with_runner(
            self.runner(specs, sources, max_files),
            MemoryLedger::new(),
            max_parallel_tables,
        )
    }

    /// Local directory of a table spec.
    pub fn local_dir(&self, spec: &TableJobSpec) -> PathBuf {
        ingest::paths::TablePaths::derive(
            spec,
            &self.root().join("data"),
            &self.root().join("sql_scripts"),
        )
        .local_dir
    }

    /// Number of files left in the local directory of `spec`.
    pub fn local_files(&self, spec: &TableJobSpec) -> usize {
        match std::fs::read_dir(self.local_dir(spec)) {
            Ok(entries) => entries.filter_map(Result::ok).count(),
            Err(_) => 0,
        }
    }
}
