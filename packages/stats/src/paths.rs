//! Canonical file names for the job's inputs and output.
//!
//! Inputs live side by side in one directory; the output is a single file
//! under the output directory.

use std::path::{Path, PathBuf};

/// File name of the incident reports table.
pub const INCIDENTS_FILE: &str = "crime.csv";

/// File name of the offense-code lookup table.
pub const OFFENSE_CODES_FILE: &str = "offense_codes.csv";

/// Name of the summary table under the output directory.
pub const OUTPUT_NAME: &str = "boston_crimes_stat";

/// Returns the path of `crime.csv` inside `input_dir`.
#[must_use]
pub fn incidents_path(input_dir: &Path) -> PathBuf {
    input_dir.join(INCIDENTS_FILE)
}

/// Returns the path of `offense_codes.csv` inside `input_dir`.
#[must_use]
pub fn offense_codes_path(input_dir: &Path) -> PathBuf {
    input_dir.join(OFFENSE_CODES_FILE)
}

/// Returns the path the summary table is published at.
#[must_use]
pub fn output_path(output_dir: &Path) -> PathBuf {
    output_dir.join(OUTPUT_NAME)
}

/// Returns the per-process staging path the summary is written to before
/// being renamed over [`output_path`].
#[must_use]
pub fn staging_path(output_dir: &Path) -> PathBuf {
    output_dir.join(format!(".{OUTPUT_NAME}.{}.staging", std::process::id()))
}

/// Renders a path as a single-quoted SQL string literal.
#[must_use]
pub fn sql_literal(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "''"))
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
