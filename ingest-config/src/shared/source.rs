use serde::Deserialize;

/// Defaults for REST source connectors.
///
/// Connection details (base url, tokens) come from the credential store; this
/// only shapes the requests and the parsing of responses.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct RestSourceConfig {
    /// Number of records requested per page.
    pub page_size: u32,
    /// Query parameter carrying the page size.
    pub page_size_param: String,
    /// Query parameter carrying the continuation cursor.
    pub cursor_param: String,
    /// JSON pointer to the records array in a response body.
    pub records_pointer: String,
    /// JSON pointer to the next cursor in a response body. A missing or null
    /// value means the source is exhausted.
    pub next_cursor_pointer: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RestSourceConfig {
    fn default() -> Self {
        Self {
            page_size: 10_000,
            page_size_param: "limit".to_owned(),
            cursor_param: "cursor".to_owned(),
            records_pointer: "/data".to_owned(),
            next_cursor_pointer: "/next_cursor".to_owned(),
            timeout_secs: 60,
        }
    }
}
