use std::time::Instant;

use ingest_config::shared::TableJobSpec;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::bail;
use crate::error::{ErrorKind, IngestError, IngestResult};
use crate::ingest_error;
use crate::metrics::{
    INGEST_FLUSH_DURATION_SECONDS, INGEST_FLUSHES_TOTAL, INGEST_PAGES_FETCHED_TOTAL,
    INGEST_RECORDS_FETCHED_TOTAL, TABLE,
};
use crate::paths::TablePaths;
use crate::source::Source;
use crate::stager::Stager;
use crate::types::{PageRequest, RunCounters};
use crate::warehouse::Warehouse;
use crate::writer::BatchWriter;

/// Progress of the extraction loop of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchState {
    /// Page files written since the run started.
    pub files_written: u64,
    /// Page files written since the last flush.
    pub files_since_flush: u64,
    pub flushes: u64,
    pub pages: u64,
    pub records: u64,
}

impl BatchState {
    pub fn counters(&self) -> RunCounters {
        RunCounters {
            pages: self.pages,
            records: self.records,
            flushes: self.flushes,
        }
    }

    /// A flush is due on the final page and on every `max_files`-th file.
    fn flush_due(&self, has_more: bool, max_files: usize) -> bool {
        !has_more || self.files_written % max_files.max(1) as u64 == 0
    }
}

/// Outcome of one iteration of the extraction loop.
#[derive(Debug)]
pub enum Step {
    /// Fetch the next page with this request.
    Continue(PageRequest),
    /// The source reported its last page, which has been flushed.
    Exhausted,
    /// The source refused to authenticate before the fetch.
    AuthFailed,
    FetchFailed(IngestError),
}

/// How a successful extraction loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    Exhausted,
    /// Authentication failed before any page was fetched.
    AuthFailed,
}

/// Collaborators of the extraction loop of one table.
pub struct Extraction<'a, Src, St, W> {
    pub spec: &'a TableJobSpec,
    pub paths: &'a TablePaths,
    pub source: &'a Src,
    pub stager: &'a St,
    pub warehouse: &'a W,
    pub max_files: usize,
}

impl<Src, St, W> Extraction<'_, Src, St, W>
where
    Src: Source + Sync,
    St: Stager + Sync,
    W: Warehouse + Sync,
{
    /// Pages through the source until it is exhausted, flushing batches along
    /// the way.
    ///
    /// `state` is updated in place so the caller can report progress even when
    /// the loop fails.
    pub async fn run(
        &self,
        writer: &mut BatchWriter,
        state: &mut BatchState,
    ) -> IngestResult<LoopEnd> {
        let mut request = self.source.initial_request(self.spec.load_type);

        loop {
            match self.step(writer, state, &request).await? {
                Step::Continue(next_request) => request = next_request,
                Step::Exhausted => return Ok(LoopEnd::Exhausted),
                Step::AuthFailed if state.pages == 0 => {
                    warn!(
                        alias = %self.spec.alias,
                        "source authentication failed before the first page, nothing was loaded"
                    );
                    return Ok(LoopEnd::AuthFailed);
                }
                Step::AuthFailed => {
                    bail!(
                        ErrorKind::AuthenticationError,
                        "Source authentication failed during extraction",
                        format!(
                            "{} pages fetched, {} pages not flushed",
                            state.pages, state.files_since_flush
                        )
                    );
                }
                Step::FetchFailed(err) => return Err(err),
            }
        }
    }

    /// Authenticates, fetches and persists one page, then flushes if due.
    async fn step(
        &self,
        writer: &mut BatchWriter,
        state: &mut BatchState,
        request: &PageRequest,
    ) -> IngestResult<Step> {
        if !self.source.authenticate().await {
            return Ok(Step::AuthFailed);
        }

        let page = match self
            .source
            .fetch_page(self.spec.load_type, self.spec.endpoint(), request)
            .await
        {
            Ok(page) => page,
            Err(err) => return Ok(Step::FetchFailed(err)),
        };

        writer.write_page(&page.records).await?;
        state.pages += 1;
        state.records += page.records.len() as u64;
        state.files_written += 1;
        state.files_since_flush += 1;

        counter!(INGEST_PAGES_FETCHED_TOTAL, TABLE => self.spec.alias.clone()).increment(1);
        counter!(INGEST_RECORDS_FETCHED_TOTAL, TABLE => self.spec.alias.clone())
            .increment(page.records.len() as u64);
        debug!(
            alias = %self.spec.alias,
            page = state.pages,
            records = page.records.len(),
            has_more = page.has_more,
            "fetched page"
        );

        if state.flush_due(page.has_more, self.max_files) {
            self.flush(writer, state).await?;
        }

        if page.has_more {
            Ok(Step::Continue(page.next_request))
        } else {
            Ok(Step::Exhausted)
        }
    }

    /// Uploads pending page files, merges them into the target and archives
    /// them.
    async fn flush(&self, writer: &BatchWriter, state: &mut BatchState) -> IngestResult<()> {
        let started = Instant::now();

        let uploaded = self
            .stager
            .upload_directory(writer.dir(), &self.paths.staging_prefix)
            .await?;

        self.warehouse
            .execute_script(&self.paths.merge_script)
            .await
            .map_err(|err| {
                ingest_error!(
                    ErrorKind::MergeFailed,
                    "Merge script failed",
                    format!("{}: {err}", self.paths.merge_script.display())
                )
            })?;

        self.stager
            .archive(&self.paths.staging_prefix, &self.paths.processed_prefix)
            .await?;
        writer.purge().await?;

        state.files_since_flush = 0;
        state.flushes += 1;

        let elapsed = started.elapsed();
        counter!(INGEST_FLUSHES_TOTAL, TABLE => self.spec.alias.clone()).increment(1);
        histogram!(INGEST_FLUSH_DURATION_SECONDS, TABLE => self.spec.alias.clone())
            .record(elapsed.as_secs_f64());
        info!(
            alias = %self.spec.alias,
            files = uploaded,
            flush = state.flushes,
            elapsed_ms = elapsed.as_millis() as u64,
            "flushed batch"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_is_due_on_multiples_and_on_last_page() {
        let mut state = BatchState::default();

        state.files_written = 1;
        assert!(!state.flush_due(true, 2));
        assert!(state.flush_due(false, 2));

        state.files_written = 2;
        assert!(state.flush_due(true, 2));

        state.files_written = 7;
        assert!(state.flush_due(true, 1));
    }

    #[test]
    fn counters_mirror_state() {
        let state = BatchState {
            files_written: 4,
            files_since_flush: 1,
            flushes: 2,
            pages: 4,
            records: 40,
        };

        assert_eq!(
            state.counters(),
            RunCounters {
                pages: 4,
                records: 40,
                flushes: 2
            }
        );
    }
}
