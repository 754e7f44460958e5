use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::credentials::{CredentialProvider, Credentials};
use crate::error::{ErrorKind, IngestResult};
use crate::ingest_error;

/// Credential provider backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialProvider {
    entries: Arc<RwLock<BTreeMap<String, Credentials>>>,
}

impl MemoryCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, Credentials>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub async fn insert(&self, key: impl Into<String>, credentials: Credentials) {
        self.entries.write().await.insert(key.into(), credentials);
    }

    pub async fn remove(&self, key: &str) -> Option<Credentials> {
        self.entries.write().await.remove(key)
    }
}

impl CredentialProvider for MemoryCredentialProvider {
    async fn get(&self, key: &str) -> IngestResult<Credentials> {
        self.entries.read().await.get(key).cloned().ok_or_else(|| {
            ingest_error!(
                ErrorKind::MissingCredentials,
                "No credentials stored under key",
                key
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_stored_credentials() {
        let provider = MemoryCredentialProvider::new();
        provider
            .insert("/dev/crm", [("token", "t")].into_iter().collect())
            .await;

        let credentials = provider.get("/dev/crm").await.unwrap();
        assert_eq!(credentials.get("token"), Some("t"));

        let err = provider.get("/dev/other").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredentials);
    }
}
