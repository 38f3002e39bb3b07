#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Per-district crime statistics for Boston incident reports.
//!
//! Reads `crime.csv` and `offense_codes.csv`, cleans and joins them, and
//! publishes one row per police district with:
//!
//! | Column | Meaning |
//! |--------|---------|
//! | `district` | district code |
//! | `crimes_total` | number of incidents |
//! | `crimes_monthly` | median incidents per (year, month) |
//! | `frequent_crime_types` | three most frequent crime types, most frequent first |
//! | `lat`, `lng` | mean incident coordinates |
//!
//! All relational work runs inside an embedded `DuckDB` [`session::Session`]
//! that lives for exactly one [`run`]. The result is written as a single
//! Parquet file at `<output_dir>/boston_crimes_stat`, replacing any previous
//! run's output only once the new file is complete.

pub mod aggregate;
pub mod clean;
pub mod load;
pub mod output;
pub mod paths;
pub mod session;

use std::path::PathBuf;

use boston_crimes_crime_models::{DistrictSummary, InputEncoding, MedianStrategy};

use crate::session::{Session, SessionConfig};

/// Errors that can occur while computing the district statistics.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// An input file does not exist.
    #[error("Input file not found: {}", path.display())]
    MissingInput {
        /// Expected location of the file.
        path: PathBuf,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path that caused the error.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The offense-code file could not be parsed.
    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        /// Path of the file being parsed.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// The engine could not read an input file.
    #[error("Failed to read {}: {source}", path.display())]
    DataAccess {
        /// Path of the file being read.
        path: PathBuf,
        /// Underlying engine error.
        source: duckdb::Error,
    },

    /// A required column is absent from an input table.
    #[error("Column {column} is missing from {table}")]
    MissingColumn {
        /// Input file name.
        table: &'static str,
        /// Expected column name.
        column: String,
    },

    /// Any other engine failure.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),
}

/// Settings for one run of the job.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Directory containing `crime.csv` and `offense_codes.csv`.
    pub input_dir: PathBuf,
    /// Directory the summary table is written under.
    pub output_dir: PathBuf,
    /// How the monthly median is computed.
    pub median: MedianStrategy,
    /// Encoding of both input files.
    pub encoding: InputEncoding,
    /// Engine resource limits.
    pub session: SessionConfig,
}

impl StatsConfig {
    /// Creates a config with default median, encoding and engine limits.
    #[must_use]
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            median: MedianStrategy::default(),
            encoding: InputEncoding::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Runs the whole pipeline once.
///
/// Returns the rows that were written, ordered by district.
///
/// # Errors
///
/// Returns [`StatsError`] if an input is missing or malformed, an engine
/// query fails, or the output cannot be written. Nothing is published in any
/// of these cases.
pub fn run(config: &StatsConfig) -> Result<Vec<DistrictSummary>, StatsError> {
    log::info!(
        "Computing district statistics from {} into {}",
        config.input_dir.display(),
        config.output_dir.display()
    );

    let session = Session::open(&config.session)?;

    load::load_incidents(
        &session,
        &paths::incidents_path(&config.input_dir),
        config.encoding,
    )?;
    let raw_offenses =
        load::read_offense_codes(&paths::offense_codes_path(&config.input_dir), config.encoding)?;

    clean::clean_incidents(&session)?;
    let offenses = clean::clean_offense_codes(&raw_offenses);
    clean::register_offense_codes(&session, &offenses)?;
    clean::join_incidents(&session)?;

    aggregate::district_totals(&session)?;
    aggregate::district_monthly(&session, config.median)?;
    aggregate::district_top_crime_types(&session)?;
    aggregate::merge_summary(&session)?;

    output::write_summary(&session, &config.output_dir)?;
    let rows = aggregate::summary_rows(&session)?;

    log::info!("District statistics complete: {} districts", rows.len());
    Ok(rows)
}
