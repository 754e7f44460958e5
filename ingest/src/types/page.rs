use std::collections::BTreeMap;

use crate::types::TableRow;

/// Continuation state handed to a source for the next page.
///
/// Opaque to the orchestrator: only the source that produced it interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Cursor returned by the previous page, `None` for the first page.
    pub cursor: Option<String>,
    /// Query parameters sent with every page.
    pub params: BTreeMap<String, String>,
}

impl PageRequest {
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Returns a copy of this request pointing at `cursor`.
    pub fn advance(&self, cursor: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            params: self.params.clone(),
        }
    }
}

/// One page returned by a source.
///
/// `next_request` is only meaningful when `has_more` is `true`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub has_more: bool,
    pub next_request: PageRequest,
    pub records: Vec<TableRow>,
}

impl PageResult {
    /// Builds the final page of a source.
    pub fn last(records: Vec<TableRow>) -> Self {
        Self {
            has_more: false,
            next_request: PageRequest::default(),
            records,
        }
    }

    /// Builds a page followed by `next_request`.
    pub fn more(records: Vec<TableRow>, next_request: PageRequest) -> Self {
        Self {
            has_more: true,
            next_request,
            records,
        }
    }
}
