use serde::Deserialize;

/// Object storage used as the staging area between extraction and merge.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagerConfig {
    /// In-memory staging, useful for dry runs against a local warehouse.
    Memory,
    /// Amazon S3 bucket.
    S3 {
        bucket: String,
        #[serde(default)]
        region: Option<String>,
        /// Optional key prefix prepended to every staging path.
        #[serde(default)]
        key_root: Option<String>,
    },
}
