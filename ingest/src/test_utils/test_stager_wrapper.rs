use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, IngestResult};
use crate::stager::Stager;
use crate::test_utils::timeline::{Timeline, TimelineEvent};

#[derive(Debug, Default)]
struct Failures {
    uploads: usize,
    deletes: usize,
}

/// Wraps a stager to record its calls on a [`Timeline`] and inject failures.
#[derive(Debug, Clone)]
pub struct TestStagerWrapper<S> {
    wrapped_stager: S,
    timeline: Timeline,
    failures: Arc<Mutex<Failures>>,
}

impl<S> TestStagerWrapper<S> {
    pub fn wrap(stager: S, timeline: Timeline) -> Self {
        Self {
            wrapped_stager: stager,
            timeline,
            failures: Arc::new(Mutex::new(Failures::default())),
        }
    }

    pub fn inner(&self) -> &S {
        &self.wrapped_stager
    }

    /// Fails the next `times` uploads.
    pub async fn fail_uploads(&self, times: usize) {
        self.failures.lock().await.uploads = times;
    }

    /// Fails the next `times` prefix deletions.
    pub async fn fail_deletes(&self, times: usize) {
        self.failures.lock().await.deletes = times;
    }
}

impl<S> Stager for TestStagerWrapper<S>
where
    S: Stager + Send + Sync,
{
    async fn upload_directory(&self, local_dir: &Path, prefix: &str) -> IngestResult<usize> {
        {
            let mut failures = self.failures.lock().await;
            if failures.uploads > 0 {
                failures.uploads -= 1;
                bail!(ErrorKind::StageUploadFailed, "Scripted upload failure", prefix);
            }
        }

        let objects = self.wrapped_stager.upload_directory(local_dir, prefix).await?;
        self.timeline
            .record(TimelineEvent::Upload {
                prefix: prefix.to_owned(),
                objects,
            })
            .await;

        Ok(objects)
    }

    async fn archive(&self, prefix: &str, processed_prefix: &str) -> IngestResult<usize> {
        let moved = self.wrapped_stager.archive(prefix, processed_prefix).await?;
        self.timeline
            .record(TimelineEvent::Archive {
                prefix: prefix.to_owned(),
            })
            .await;

        Ok(moved)
    }

    async fn delete_prefix(&self, prefix: &str) -> IngestResult<usize> {
        {
            let mut failures = self.failures.lock().await;
            if failures.deletes > 0 {
                failures.deletes -= 1;
                bail!(ErrorKind::StageDeleteFailed, "Scripted delete failure", prefix);
            }
        }

        let deleted = self.wrapped_stager.delete_prefix(prefix).await?;
        self.timeline
            .record(TimelineEvent::Delete {
                prefix: prefix.to_owned(),
            })
            .await;

        Ok(deleted)
    }
}
