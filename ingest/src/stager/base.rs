use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, IngestResult};
use crate::ingest_error;

/// Remote object storage used to hand page files over to the warehouse.
///
/// Prefixes never end with `/`; objects live at `{prefix}/{file name}`.
pub trait Stager {
    /// Uploads every regular file of `local_dir` under `prefix` and returns the
    /// number of uploaded objects.
    fn upload_directory(
        &self,
        local_dir: &Path,
        prefix: &str,
    ) -> impl Future<Output = IngestResult<usize>> + Send;

    /// Moves every object under `prefix` to `processed_prefix`, keeping the
    /// relative key, and returns the number of moved objects.
    fn archive(
        &self,
        prefix: &str,
        processed_prefix: &str,
    ) -> impl Future<Output = IngestResult<usize>> + Send;

    /// Deletes every object under `prefix` and returns how many were deleted.
    fn delete_prefix(&self, prefix: &str) -> impl Future<Output = IngestResult<usize>> + Send;
}

/// Lists the regular files of a directory in file name order.
pub async fn list_local_files(local_dir: &Path) -> IngestResult<Vec<PathBuf>> {
    let upload_error = |err: std::io::Error| {
        ingest_error!(
            ErrorKind::StageUploadFailed,
            "Failed to list local page files",
            format!("{}: {err}", local_dir.display())
        )
    };

    let mut entries = tokio::fs::read_dir(local_dir).await.map_err(upload_error)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(upload_error)? {
        if entry.file_type().await.map_err(upload_error)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    Ok(files)
}

/// Key of the object uploaded from `path` under `prefix`.
pub fn object_key(prefix: &str, path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    Some(format!("{}/{file_name}", prefix.trim_end_matches('/')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_join_prefix_and_file_name() {
        assert_eq!(
            object_key("DEV/CRM/USERS", Path::new("/tmp/users/users_000001_x.tsv")).as_deref(),
            Some("DEV/CRM/USERS/users_000001_x.tsv")
        );
        assert_eq!(
            object_key("DEV/CRM/USERS/", Path::new("a.tsv")).as_deref(),
            Some("DEV/CRM/USERS/a.tsv")
        );
    }

    #[tokio::test]
    async fn lists_only_regular_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("b.tsv"), "").await.unwrap();
        tokio::fs::write(dir.path().join("a.tsv"), "").await.unwrap();
        tokio::fs::create_dir(dir.path().join("nested")).await.unwrap();

        let files = list_local_files(dir.path()).await.unwrap();

        assert_eq!(files, vec![dir.path().join("a.tsv"), dir.path().join("b.tsv")]);
    }

    #[tokio::test]
    async fn missing_directory_is_an_upload_error() {
        let dir = tempfile::tempdir().unwrap();

        let err = list_local_files(&dir.path().join("missing")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StageUploadFailed);
    }
}
