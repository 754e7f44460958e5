use serde::Deserialize;
use std::collections::BTreeMap;

use crate::Secret;

/// Where connection credentials are resolved from.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsConfig {
    /// AWS Systems Manager parameter store; every parameter holds a JSON object.
    Ssm {
        #[serde(default)]
        region: Option<String>,
    },
    /// Static credentials keyed like the parameter store, for local runs.
    Memory {
        #[serde(default)]
        entries: BTreeMap<String, BTreeMap<String, Secret>>,
    },
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self::Ssm { region: None }
    }
}
