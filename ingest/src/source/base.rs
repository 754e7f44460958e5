use ingest_config::shared::LoadType;
use std::future::Future;

use crate::error::IngestResult;
use crate::types::{PageRequest, PageResult};

/// A paginated data source.
///
/// The orchestrator calls [`Source::authenticate`] before every page and
/// [`Source::fetch_page`] right after it, handing back the request returned by
/// the previous page.
pub trait Source {
    /// Establishes or refreshes the session. Returns `false` when the source
    /// rejected the credentials.
    fn authenticate(&self) -> impl Future<Output = bool> + Send;

    /// Request for the first page of a run with the given load type.
    fn initial_request(&self, load_type: LoadType) -> PageRequest;

    fn fetch_page(
        &self,
        load_type: LoadType,
        endpoint: &str,
        request: &PageRequest,
    ) -> impl Future<Output = IngestResult<PageResult>> + Send;
}
