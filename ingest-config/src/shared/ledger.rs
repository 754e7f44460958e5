use serde::Deserialize;

/// Destination of the per-table run statistics.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerConfig {
    /// Keep run statistics in memory only; they are still logged.
    #[default]
    Memory,
    /// Insert one row per run into a warehouse table.
    Warehouse {
        /// Credential key of the warehouse holding the stats table.
        credentials_key: String,
        /// Fully qualified stats table name.
        table: String,
    },
}
