use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ErrorKind, IngestResult};
use crate::ingest_error;
use crate::stager::{Stager, list_local_files, object_key};

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Vec<u8>>,
}

/// Object stager keeping objects in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStager {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the keys currently stored under `prefix`.
    pub async fn keys(&self, prefix: &str) -> Vec<String> {
        let inner = self.inner.lock().await;
        let prefix = folder(prefix);
        inner
            .objects
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect()
    }

    pub async fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().await.objects.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.objects.is_empty()
    }
}

impl Stager for MemoryStager {
    async fn upload_directory(&self, local_dir: &Path, prefix: &str) -> IngestResult<usize> {
        let files = list_local_files(local_dir).await?;

        let mut uploaded = Vec::with_capacity(files.len());
        for path in files {
            let key = object_key(prefix, &path).ok_or_else(|| {
                ingest_error!(
                    ErrorKind::StageUploadFailed,
                    "Page file name is not valid UTF-8",
                    path.display()
                )
            })?;
            let content = tokio::fs::read(&path).await.map_err(|err| {
                ingest_error!(
                    ErrorKind::StageUploadFailed,
                    "Failed to read page file",
                    format!("{}: {err}", path.display())
                )
            })?;
            uploaded.push((key, content));
        }

        let count = uploaded.len();
        self.inner.lock().await.objects.extend(uploaded);
        debug!(prefix, objects = count, "uploaded local directory");

        Ok(count)
    }

    async fn archive(&self, prefix: &str, processed_prefix: &str) -> IngestResult<usize> {
        let mut inner = self.inner.lock().await;
        let source = folder(prefix);
        let destination = folder(processed_prefix);

        let keys: Vec<String> = inner
            .objects
            .keys()
            .filter(|key| key.starts_with(&source))
            .cloned()
            .collect();
        for key in &keys {
            if let Some(content) = inner.objects.remove(key) {
                let relative = &key[source.len()..];
                inner.objects.insert(format!("{destination}{relative}"), content);
            }
        }

        Ok(keys.len())
    }

    async fn delete_prefix(&self, prefix: &str) -> IngestResult<usize> {
        let mut inner = self.inner.lock().await;
        let prefix = folder(prefix);

        let before = inner.objects.len();
        inner.objects.retain(|key, _| !key.starts_with(&prefix));

        Ok(before - inner.objects.len())
    }
}

fn folder(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_archive_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("p1.tsv"), "1\n").await.unwrap();
        tokio::fs::write(dir.path().join("p2.tsv"), "2\n").await.unwrap();
        let stager = MemoryStager::new();

        assert_eq!(stager.upload_directory(dir.path(), "DEV/CRM/USERS").await.unwrap(), 2);
        assert_eq!(
            stager.keys("DEV/CRM/USERS").await,
            vec!["DEV/CRM/USERS/p1.tsv", "DEV/CRM/USERS/p2.tsv"]
        );

        let moved = stager
            .archive("DEV/CRM/USERS", "PROCESSED/DEV/CRM/USERS")
            .await
            .unwrap();
        assert_eq!(moved, 2);
        assert!(stager.keys("DEV/CRM/USERS").await.is_empty());
        assert_eq!(
            stager.object("PROCESSED/DEV/CRM/USERS/p1.tsv").await,
            Some(b"1\n".to_vec())
        );

        assert_eq!(stager.delete_prefix("PROCESSED/DEV/CRM/USERS").await.unwrap(), 2);
        assert!(stager.is_empty().await);
    }

    #[tokio::test]
    async fn prefixes_do_not_match_sibling_tables() {
        let stager = MemoryStager::new();
        {
            let mut inner = stager.inner.lock().await;
            inner.objects.insert("DEV/CRM/USERS/a.tsv".to_owned(), Vec::new());
            inner.objects.insert("DEV/CRM/USERS_ARCHIVE/b.tsv".to_owned(), Vec::new());
        }

        assert_eq!(stager.delete_prefix("DEV/CRM/USERS").await.unwrap(), 1);
        assert_eq!(stager.len().await, 1);
    }
}
