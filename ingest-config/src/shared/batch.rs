use serde::Deserialize;

/// Batching policy for the extraction loop.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Number of local page files accumulated before they are pushed to staging
    /// and merged into the target.
    ///
    /// The final page always triggers a push regardless of this value.
    pub max_files: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_files: 500 }
    }
}
