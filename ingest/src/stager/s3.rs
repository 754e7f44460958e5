use std::path::Path;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use tracing::{debug, info};

use crate::error::{ErrorKind, IngestError, IngestResult};
use crate::ingest_error;
use crate::stager::{Stager, list_local_files, object_key};

/// Maximum number of keys accepted by a single `DeleteObjects` call.
const MAX_KEYS_PER_DELETE: usize = 1000;

/// Stager writing page files to an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Stager {
    client: Client,
    bucket: String,
    key_root: Option<String>,
}

impl S3Stager {
    /// Creates a stager from the default AWS configuration chain.
    pub async fn new(bucket: String, region: Option<String>, key_root: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;

        Self::from_client(Client::new(&config), bucket, key_root)
    }

    pub fn from_client(client: Client, bucket: String, key_root: Option<String>) -> Self {
        let key_root = key_root
            .map(|root| root.trim_matches('/').to_owned())
            .filter(|root| !root.is_empty());

        Self {
            client,
            bucket,
            key_root,
        }
    }

    fn full_prefix(&self, prefix: &str) -> String {
        let prefix = prefix.trim_matches('/');
        match &self.key_root {
            Some(root) => format!("{root}/{prefix}"),
            None => prefix.to_owned(),
        }
    }

    async fn list_keys(&self, full_prefix: &str, kind: ErrorKind) -> IngestResult<Vec<String>> {
        let folder = format!("{full_prefix}/");
        let mut keys = Vec::new();
        let mut continuation_token = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&folder)
                .set_continuation_token(continuation_token)
                .send()
                .await
                .map_err(|err| {
                    ingest_error!(
                        kind,
                        "Failed to list staged objects",
                        format!("{folder}: {}", DisplayErrorContext(&err))
                    )
                })?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(str::to_owned),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_owned());
                }
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn delete_keys(&self, keys: &[String], kind: ErrorKind) -> IngestResult<usize> {
        for chunk in keys.chunks(MAX_KEYS_PER_DELETE) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| ingest_error!(kind, "Invalid object identifier", err))?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|err| ingest_error!(kind, "Invalid delete request", err))?;

            let response = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|err| {
                    ingest_error!(
                        kind,
                        "Failed to delete staged objects",
                        DisplayErrorContext(&err)
                    )
                })?;

            let errors: Vec<IngestError> = response
                .errors()
                .iter()
                .map(|error| {
                    ingest_error!(
                        kind,
                        "Staged object was not deleted",
                        format!(
                            "{}: {}",
                            error.key().unwrap_or_default(),
                            error.message().unwrap_or_default()
                        )
                    )
                })
                .collect();
            if !errors.is_empty() {
                return Err(errors.into());
            }
        }

        Ok(keys.len())
    }
}

impl Stager for S3Stager {
    async fn upload_directory(&self, local_dir: &Path, prefix: &str) -> IngestResult<usize> {
        let full_prefix = self.full_prefix(prefix);
        let files = list_local_files(local_dir).await?;

        for path in &files {
            let key = object_key(&full_prefix, path).ok_or_else(|| {
                ingest_error!(
                    ErrorKind::StageUploadFailed,
                    "Page file name is not valid UTF-8",
                    path.display()
                )
            })?;
            let body = ByteStream::from_path(path).await.map_err(|err| {
                ingest_error!(
                    ErrorKind::StageUploadFailed,
                    "Failed to read page file",
                    format!("{}: {err}", path.display())
                )
            })?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(body)
                .send()
                .await
                .map_err(|err| {
                    ingest_error!(
                        ErrorKind::StageUploadFailed,
                        "Failed to upload page file",
                        format!("s3://{}/{key}: {}", self.bucket, DisplayErrorContext(&err))
                    )
                })?;

            debug!(bucket = %self.bucket, key, "uploaded page file");
        }

        info!(
            bucket = %self.bucket,
            prefix = %full_prefix,
            objects = files.len(),
            "uploaded local directory"
        );

        Ok(files.len())
    }

    async fn archive(&self, prefix: &str, processed_prefix: &str) -> IngestResult<usize> {
        let source = self.full_prefix(prefix);
        let destination = self.full_prefix(processed_prefix);
        let keys = self.list_keys(&source, ErrorKind::StageArchiveFailed).await?;

        for key in &keys {
            let relative = &key[source.len()..];
            let target_key = format!("{destination}{relative}");

            self.client
                .copy_object()
                .bucket(&self.bucket)
                .copy_source(copy_source(&self.bucket, key))
                .key(&target_key)
                .send()
                .await
                .map_err(|err| {
                    ingest_error!(
                        ErrorKind::StageArchiveFailed,
                        "Failed to copy staged object",
                        format!("{key} -> {target_key}: {}", DisplayErrorContext(&err))
                    )
                })?;
        }

        self.delete_keys(&keys, ErrorKind::StageArchiveFailed).await?;
        debug!(from = %source, to = %destination, objects = keys.len(), "archived staged objects");

        Ok(keys.len())
    }

    async fn delete_prefix(&self, prefix: &str) -> IngestResult<usize> {
        let full_prefix = self.full_prefix(prefix);
        let keys = self.list_keys(&full_prefix, ErrorKind::StageDeleteFailed).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let deleted = self.delete_keys(&keys, ErrorKind::StageDeleteFailed).await?;
        debug!(prefix = %full_prefix, objects = deleted, "deleted staged objects");

        Ok(deleted)
    }
}

/// Renders the URL-encoded `bucket/key` expected by `CopyObject`.
///
/// Each key segment is encoded on its own so the separators stay readable.
fn copy_source(bucket: &str, key: &str) -> String {
    let key = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");

    format!("{}/{key}", urlencoding::encode(bucket))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stager(key_root: Option<&str>) -> S3Stager {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();

        S3Stager::from_client(
            Client::from_conf(config),
            "bucket".to_owned(),
            key_root.map(str::to_owned),
        )
    }

    #[test]
    fn prefixes_are_placed_under_the_key_root() {
        assert_eq!(stager(None).full_prefix("DEV/CRM/USERS"), "DEV/CRM/USERS");
        assert_eq!(
            stager(Some("/ingest/")).full_prefix("DEV/CRM/USERS/"),
            "ingest/DEV/CRM/USERS"
        );
        assert_eq!(stager(Some("")).full_prefix("DEV/CRM/USERS"), "DEV/CRM/USERS");
    }

    #[test]
    fn copy_source_encodes_reserved_characters_per_segment() {
        assert_eq!(
            copy_source("bucket", "DEV/CRM/USERS/users_000001_ab.tsv"),
            "bucket/DEV/CRM/USERS/users_000001_ab.tsv"
        );
        assert_eq!(
            copy_source("bucket", "DEV/SHOP/C#_100%+/page 1.tsv"),
            "bucket/DEV/SHOP/C%23_100%25%2B/page%201.tsv"
        );
    }
}
