use std::io;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, WriterBuilder};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bail;
use crate::error::{ErrorKind, IngestResult};
use crate::types::TableRow;

/// Extension of page files written to the local directory.
const PAGE_FILE_EXTENSION: &str = "tsv";

/// Writes fetched pages as tab-delimited files into a table's local directory.
///
/// Each page becomes exactly one file, including empty pages, so the number of
/// files written always equals the number of pages persisted.
#[derive(Debug)]
pub struct BatchWriter {
    dir: PathBuf,
    file_stem: String,
    files_written: u64,
}

impl BatchWriter {
    pub fn new(dir: impl Into<PathBuf>, table: &str) -> Self {
        Self {
            dir: dir.into(),
            file_stem: table.trim().replace(' ', "_").to_lowercase(),
            files_written: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of page files written by this writer since it was created.
    pub fn files_written(&self) -> u64 {
        self.files_written
    }

    /// Creates the local directory and removes leftovers of an earlier attempt.
    pub async fn prepare(&self) -> IngestResult<usize> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let removed = self.purge().await?;
        if removed > 0 {
            warn!(
                dir = %self.dir.display(),
                files = removed,
                "removed leftover page files from a previous attempt"
            );
        }

        Ok(removed)
    }

    /// Writes one page and returns the path of the new file.
    pub async fn write_page(&mut self, rows: &[TableRow]) -> IngestResult<PathBuf> {
        let content = encode_page(rows)?;

        let sequence = self.files_written + 1;
        let path = self.dir.join(format!(
            "{}_{sequence:06}_{}.{PAGE_FILE_EXTENSION}",
            self.file_stem,
            Uuid::new_v4().simple()
        ));
        tokio::fs::write(&path, content).await?;
        self.files_written = sequence;

        debug!(path = %path.display(), rows = rows.len(), "wrote page file");

        Ok(path)
    }

    /// Deletes every regular file and symlink of the local directory.
    ///
    /// Subdirectories are left alone. A missing directory is not an error.
    pub async fn purge(&self) -> IngestResult<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(dir = %self.dir.display(), "local directory does not exist, nothing to purge");
                return Ok(0);
            }
            Err(err) => return Err(err.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_file() || file_type.is_symlink() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Renders rows as tab-delimited text without a header, quoting only when needed.
fn encode_page(rows: &[TableRow]) -> IngestResult<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Necessary)
        .has_headers(false)
        .flexible(true)
        .from_writer(Vec::new());

    for row in rows {
        writer.write_record(row.values.iter().map(|cell| cell.to_string()))?;
    }

    match writer.into_inner() {
        Ok(buffer) => Ok(buffer),
        Err(err) => bail!(
            ErrorKind::IoError,
            "Failed to flush page file buffer",
            err.error()
        ),
    }
}
