//! Publishing the district summary as a Parquet file.
//!
//! The engine writes into a hidden staging file next to the target, and the
//! staging file is renamed over the target once the write has completed. A
//! run that fails before the rename leaves the previous output in place.

use std::path::{Path, PathBuf};

use crate::StatsError;
use crate::aggregate::SUMMARY_TABLE;
use crate::paths::{ensure_dir, output_path, sql_literal, staging_path};
use crate::session::Session;

/// A staging file that is removed on drop unless it was published.
struct StagingFile {
    path: PathBuf,
    published: bool,
}

impl StagingFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            published: false,
        }
    }

    /// Renames the staging file to `target`, replacing what is there.
    fn publish(mut self, target: &Path) -> Result<(), StatsError> {
        if target.is_dir() {
            log::warn!(
                "Replacing directory {} with a single-file table",
                target.display()
            );
            std::fs::remove_dir_all(target).map_err(|source| StatsError::Io {
                path: target.to_path_buf(),
                source,
            })?;
        }

        std::fs::rename(&self.path, target).map_err(|source| StatsError::Io {
            path: target.to_path_buf(),
            source,
        })?;
        self.published = true;
        Ok(())
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if !self.published && self.path.exists() {
            log::debug!("Removing unpublished staging file {}", self.path.display());
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Writes [`SUMMARY_TABLE`] to `<output_dir>/boston_crimes_stat`, replacing
/// any existing output.
///
/// Creates `output_dir` if needed. Returns the published path.
///
/// # Errors
///
/// * [`StatsError::Io`] if the directory cannot be created or the staging
///   file cannot be moved into place
/// * [`StatsError::DuckDb`] if the engine fails to write the file
pub fn write_summary(session: &Session, output_dir: &Path) -> Result<PathBuf, StatsError> {
    ensure_dir(output_dir).map_err(|source| StatsError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let target = output_path(output_dir);
    let staging = StagingFile::new(staging_path(output_dir));

    session.execute_batch(&format!(
        "COPY {SUMMARY_TABLE} TO {} (FORMAT PARQUET, COMPRESSION SNAPPY);",
        sql_literal(&staging.path)
    ))?;

    staging.publish(&target)?;

    log::info!("Wrote district summary to {}", target.display());
    Ok(target)
}
