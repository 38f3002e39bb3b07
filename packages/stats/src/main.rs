#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Batch job computing per-district crime statistics.
//!
//! Reads `crime.csv` and `offense_codes.csv` from `--input_dir` and writes the
//! `boston_crimes_stat` Parquet table under `--output_dir`.

use std::path::PathBuf;

use boston_crimes_crime_models::{InputEncoding, MedianStrategy};
use boston_crimes_stats::StatsConfig;
use boston_crimes_stats::session::SessionConfig;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "boston_crimes_stats",
    about = "Per-district crime statistics for Boston incident reports"
)]
struct Cli {
    /// Directory containing `crime.csv` and `offense_codes.csv`
    #[arg(long = "input_dir")]
    input_dir: PathBuf,

    /// Directory the `boston_crimes_stat` table is written under
    #[arg(long = "output_dir", default_value = "path/to/output_folder")]
    output_dir: PathBuf,

    /// Monthly median strategy (`exact` or `approximate`)
    #[arg(long, default_value = "exact")]
    median: MedianStrategy,

    /// Encoding of the input files (`utf-8` or `latin-1`)
    #[arg(long, default_value = "utf-8")]
    encoding: InputEncoding,

    /// Worker threads for the query engine (defaults to one per core)
    #[arg(long)]
    threads: Option<u32>,

    /// Memory limit for the query engine, e.g. `4GB`
    #[arg(long)]
    memory_limit: Option<String>,
}

impl From<Cli> for StatsConfig {
    fn from(cli: Cli) -> Self {
        Self {
            input_dir: cli.input_dir,
            output_dir: cli.output_dir,
            median: cli.median,
            encoding: cli.encoding,
            session: SessionConfig {
                threads: cli.threads,
                memory_limit: cli.memory_limit,
            },
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let config = StatsConfig::from(Cli::parse());

    let rows = boston_crimes_stats::run(&config)?;

    for row in &rows {
        log::info!(
            "{}: total={} monthly={} types=[{}] at ({:.5}, {:.5})",
            row.district,
            row.crimes_total,
            row.crimes_monthly,
            row.frequent_crime_types,
            row.lat,
            row.lng
        );
    }
    log::info!(
        "Wrote {} districts to {}",
        rows.len(),
        boston_crimes_stats::paths::output_path(&config.output_dir).display()
    );

    Ok(())
}
