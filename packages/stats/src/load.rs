//! Input loading and schema validation.
//!
//! `crime.csv` is scanned by the engine's CSV reader with type inference so
//! the large incident table never passes through Rust. The small
//! offense-code table is read with the `csv` crate so cleaning and crime
//! type derivation can be done on typed records.

use std::fmt::Write as _;
use std::path::Path;

use boston_crimes_crime_models::{IncidentColumn, InputEncoding, OffenseColumn};

use crate::paths::sql_literal;
use crate::session::Session;
use crate::StatsError;

/// Session table holding `crime.csv` exactly as read.
pub const RAW_INCIDENTS_TABLE: &str = "raw_incidents";

/// One offense-code row as read, before cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOffenseRow {
    /// `CODE` text.
    pub code: String,
    /// `NAME` text.
    pub name: String,
    /// Whether any field of the row, including columns the job does not use,
    /// was empty or missing.
    pub has_null: bool,
}

/// Loads `crime.csv` into [`RAW_INCIDENTS_TABLE`] and checks that every
/// [`IncidentColumn`] is present.
///
/// Returns the number of rows read.
///
/// # Errors
///
/// * [`StatsError::MissingInput`] / [`StatsError::Io`] if the file is absent
///   or not a regular file
/// * [`StatsError::DataAccess`] if the engine cannot read or parse it
/// * [`StatsError::MissingColumn`] if a required column is absent
pub fn load_incidents(
    session: &Session,
    path: &Path,
    encoding: InputEncoding,
) -> Result<u64, StatsError> {
    ensure_input_file(path)?;

    let mut options = String::from("header = true, auto_detect = true");
    if encoding != InputEncoding::Utf8 {
        let _ = write!(options, ", encoding = '{encoding}'");
    }

    session
        .execute_batch(&format!(
            "CREATE OR REPLACE TABLE {RAW_INCIDENTS_TABLE} AS
             SELECT * FROM read_csv({}, {options})",
            sql_literal(path)
        ))
        .map_err(|source| StatsError::DataAccess {
            path: path.to_path_buf(),
            source,
        })?;

    let columns = session.column_names(RAW_INCIDENTS_TABLE)?;
    for column in IncidentColumn::all() {
        find_column(&columns, column.as_ref()).ok_or_else(|| StatsError::MissingColumn {
            table: crate::paths::INCIDENTS_FILE,
            column: column.to_string(),
        })?;
    }

    let count = session.row_count(RAW_INCIDENTS_TABLE)?;
    log::info!("Loaded {count} incident rows from {}", path.display());
    Ok(count)
}

/// Reads `offense_codes.csv`.
///
/// The first row is the header. Fields are decoded with `encoding`. Rows
/// shorter than the header count as having null fields.
///
/// # Errors
///
/// * [`StatsError::MissingInput`] / [`StatsError::Io`] if the file is absent
///   or not a regular file
/// * [`StatsError::Csv`] if the file is not valid CSV
/// * [`StatsError::MissingColumn`] if `CODE` or `NAME` is absent
pub fn read_offense_codes(
    path: &Path,
    encoding: InputEncoding,
) -> Result<Vec<RawOffenseRow>, StatsError> {
    ensure_input_file(path)?;

    let csv_error = |source| StatsError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| encoding.decode(h).trim_start_matches('\u{feff}').trim().to_owned())
        .collect();

    let index_of = |column: OffenseColumn| {
        find_column(&headers, column.as_ref()).ok_or_else(|| StatsError::MissingColumn {
            table: crate::paths::OFFENSE_CODES_FILE,
            column: column.to_string(),
        })
    };
    let code_idx = index_of(OffenseColumn::Code)?;
    let name_idx = index_of(OffenseColumn::Name)?;

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(csv_error)?;
        let field = |i: usize| record.get(i).map(|b| encoding.decode(b)).unwrap_or_default();
        let has_null = (0..headers.len()).any(|i| record.get(i).is_none_or(<[u8]>::is_empty));

        rows.push(RawOffenseRow {
            code: field(code_idx),
            name: field(name_idx),
            has_null,
        });
    }

    log::info!("Read {} offense code rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Finds `name` among `columns`, ignoring ASCII case.
#[must_use]
pub fn find_column(columns: &[String], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.eq_ignore_ascii_case(name))
}

fn ensure_input_file(path: &Path) -> Result<(), StatsError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(StatsError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StatsError::MissingInput {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(StatsError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
