//! Deterministic local, staging and script locations of a table job.

use ingest_config::shared::TableJobSpec;
use std::path::{Path, PathBuf};

/// Directory name of the soft delete scripts.
const SOFT_DELETE_DIR: &str = "soft_delete";

/// Remote prefix under which merged batches are archived.
const PROCESSED_ROOT: &str = "PROCESSED";

/// Extension of merge and soft delete scripts.
const SCRIPT_EXTENSION: &str = "sql";

/// Paths used by one table run.
///
/// A pure function of the job spec and the configured roots. The alias is the
/// last segment of every data location, so jobs reading the same source table
/// still get their own directory and prefixes. Aliases that only differ by
/// case or spacing normalize to the same segment; the pipeline rejects those.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePaths {
    /// Remote prefix receiving the page files of a batch.
    pub staging_prefix: String,
    /// Remote prefix holding merged batches until cleanup.
    pub processed_prefix: String,
    /// Local directory receiving page files.
    pub local_dir: PathBuf,
    /// Merge script for the job's load type.
    pub merge_script: PathBuf,
    /// Soft delete reconciliation script.
    pub soft_delete_script: PathBuf,
}

impl TablePaths {
    pub fn derive(spec: &TableJobSpec, data_root: &Path, scripts_root: &Path) -> Self {
        let environment = &spec.environment;
        let platform = &spec.source.platform;

        let staging_prefix = [environment, platform, &spec.source.table, &spec.alias]
            .map(|segment| upper_segment(segment))
            .join("/");
        let processed_prefix = format!("{PROCESSED_ROOT}/{staging_prefix}");

        let local_dir = data_root
            .join(lower_segment(environment))
            .join(lower_segment(platform))
            .join(spec.load_type.as_str())
            .join(lower_segment(&spec.source.table))
            .join(lower_segment(&spec.alias));

        let script_dir = scripts_root
            .join(lower_segment(environment))
            .join(lower_segment(platform));
        let script_name = format!("{}.{SCRIPT_EXTENSION}", upper_segment(&spec.target.table));

        Self {
            staging_prefix,
            processed_prefix,
            local_dir,
            merge_script: script_dir.join(spec.load_type.as_str()).join(&script_name),
            soft_delete_script: script_dir.join(SOFT_DELETE_DIR).join(script_name),
        }
    }

}

fn normalize(segment: &str) -> String {
    segment.trim().replace(' ', "_")
}

fn lower_segment(segment: &str) -> String {
    normalize(segment).to_lowercase()
}

fn upper_segment(segment: &str) -> String {
    normalize(segment).to_uppercase()
}
