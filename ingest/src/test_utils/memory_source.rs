use std::collections::BTreeMap;
use std::sync::Arc;

use ingest_config::shared::LoadType;
use tokio::sync::Mutex;

use crate::error::{ErrorKind, IngestResult};
use crate::source::Source;
use crate::test_utils::timeline::{Timeline, TimelineEvent};
use crate::types::{PageRequest, PageResult, TableRow};
use crate::{bail, ingest_error};

const CURSOR_PREFIX: &str = "page-";

/// What the source answers when asked for a given page.
#[derive(Debug, Clone)]
pub enum ScriptedFetch {
    Page(Vec<TableRow>),
    Fail(ErrorKind),
    Panic,
}

#[derive(Debug, Default)]
struct Calls {
    authentications: usize,
    fetches: usize,
}

/// Source replaying a fixed list of pages.
///
/// Page `n` is returned for cursor `page-n`; every page but the last announces
/// a following one. Authentication succeeds unless a call index was scripted
/// to fail.
#[derive(Debug, Clone)]
pub struct MemorySource {
    alias: String,
    pages: Arc<Vec<ScriptedFetch>>,
    rejected_authentications: Arc<Vec<usize>>,
    overrides: Arc<BTreeMap<usize, ScriptedFetch>>,
    calls: Arc<Mutex<Calls>>,
    timeline: Option<Timeline>,
}

impl MemorySource {
    pub fn new(alias: impl Into<String>, pages: Vec<Vec<TableRow>>) -> Self {
        Self {
            alias: alias.into(),
            pages: Arc::new(pages.into_iter().map(ScriptedFetch::Page).collect()),
            rejected_authentications: Arc::new(Vec::new()),
            overrides: Arc::new(BTreeMap::new()),
            calls: Arc::new(Mutex::new(Calls::default())),
            timeline: None,
        }
    }

    /// Makes the `call`-th authentication (0-based) fail.
    pub fn reject_authentication(mut self, call: usize) -> Self {
        Arc::make_mut(&mut self.rejected_authentications).push(call);
        self
    }

    /// Replaces the answer for page `page` (0-based).
    pub fn script_page(mut self, page: usize, fetch: ScriptedFetch) -> Self {
        Arc::make_mut(&mut self.overrides).insert(page, fetch);
        self
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    /// Copy of this source with the same script and no recorded calls.
    pub fn fresh(&self) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Calls::default())),
            ..self.clone()
        }
    }

    pub async fn authentications(&self) -> usize {
        self.calls.lock().await.authentications
    }

    pub async fn fetches(&self) -> usize {
        self.calls.lock().await.fetches
    }

    async fn record(&self, event: TimelineEvent) {
        if let Some(timeline) = &self.timeline {
            timeline.record(event).await;
        }
    }
}

impl Source for MemorySource {
    async fn authenticate(&self) -> bool {
        let call = {
            let mut calls = self.calls.lock().await;
            calls.authentications += 1;
            calls.authentications - 1
        };
        let accepted = !self.rejected_authentications.contains(&call);

        self.record(TimelineEvent::Authenticate {
            alias: self.alias.clone(),
            accepted,
        })
        .await;

        accepted
    }

    fn initial_request(&self, _load_type: LoadType) -> PageRequest {
        PageRequest::default().with_param("limit", "100")
    }

    async fn fetch_page(
        &self,
        _load_type: LoadType,
        _endpoint: &str,
        request: &PageRequest,
    ) -> IngestResult<PageResult> {
        let page = match &request.cursor {
            None => 0,
            Some(cursor) => cursor
                .strip_prefix(CURSOR_PREFIX)
                .and_then(|index| index.parse::<usize>().ok())
                .ok_or_else(|| {
                    ingest_error!(ErrorKind::InvalidData, "Unknown cursor", cursor)
                })?,
        };

        self.calls.lock().await.fetches += 1;
        self.record(TimelineEvent::Fetch {
            alias: self.alias.clone(),
            page,
        })
        .await;

        let Some(fetch) = self.overrides.get(&page).or_else(|| self.pages.get(page)) else {
            bail!(ErrorKind::SourceFetchFailed, "Page out of range", page);
        };

        match fetch {
            ScriptedFetch::Page(rows) => {
                if page + 1 < self.pages.len() {
                    let next_request = request.advance(format!("{CURSOR_PREFIX}{}", page + 1));
                    Ok(PageResult::more(rows.clone(), next_request))
                } else {
                    Ok(PageResult::last(rows.clone()))
                }
            }
            ScriptedFetch::Fail(kind) => bail!(*kind, "Scripted fetch failure", page),
            ScriptedFetch::Panic => panic!("scripted panic while fetching page {page}"),
        }
    }
}
