//! Cleaning of both input tables and the incident/offense join.

use std::collections::BTreeSet;

use boston_crimes_crime_models::{IncidentColumn, OffenseCode, parse_offense_code};

use crate::StatsError;
use crate::load::{RAW_INCIDENTS_TABLE, RawOffenseRow};
use crate::session::Session;

/// Session table of deduplicated incidents with required fields present.
pub const INCIDENTS_TABLE: &str = "incidents";

/// Session table of cleaned offense codes.
pub const OFFENSE_CODES_TABLE: &str = "offense_codes";

/// Session table of incidents left-joined to their crime type.
pub const JOINED_TABLE: &str = "joined_incidents";

/// Row counts observed while cleaning the incident table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncidentCleanStats {
    /// Rows before cleaning.
    pub raw: u64,
    /// Rows after removing exact duplicates.
    pub distinct: u64,
    /// Rows kept after dropping those missing district or coordinates.
    pub kept: u64,
}

/// Key offense codes are deduplicated on: codes that parse as integers
/// compare numerically, anything else by its text.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum CodeKey<'a> {
    Numeric(i32),
    Text(&'a str),
}

impl<'a> CodeKey<'a> {
    fn of(code: &'a str) -> Self {
        parse_offense_code(code).map_or(Self::Text(code), Self::Numeric)
    }
}

/// Builds [`INCIDENTS_TABLE`] from [`RAW_INCIDENTS_TABLE`].
///
/// Removes rows identical in every column, removes rows whose `DISTRICT`,
/// `Lat` or `Long` is null, and casts `OFFENSE_CODE` to `INTEGER` (values
/// that do not convert become null).
///
/// # Errors
///
/// Returns [`StatsError::DuckDb`] if any statement fails.
pub fn clean_incidents(session: &Session) -> Result<IncidentCleanStats, StatsError> {
    let raw = session.row_count(RAW_INCIDENTS_TABLE)?;

    let required = IncidentColumn::all()
        .iter()
        .filter(|c| c.is_required_non_null())
        .map(|c| format!("\"{c}\" IS NOT NULL"))
        .collect::<Vec<_>>()
        .join(" AND ");

    session.execute_batch(&format!(
        "CREATE OR REPLACE TEMP TABLE distinct_incidents AS
         SELECT DISTINCT * FROM {RAW_INCIDENTS_TABLE};

         CREATE OR REPLACE TABLE {INCIDENTS_TABLE} AS
         SELECT * REPLACE (TRY_CAST(OFFENSE_CODE AS INTEGER) AS OFFENSE_CODE)
         FROM distinct_incidents
         WHERE {required};"
    ))?;

    let distinct = session.row_count("distinct_incidents")?;
    let kept = session.row_count(INCIDENTS_TABLE)?;
    session.execute_batch("DROP TABLE distinct_incidents;")?;

    log::info!(
        "Cleaned incidents: {raw} rows -> {distinct} distinct ({} duplicates removed) -> {kept} with district and coordinates ({} dropped)",
        raw - distinct,
        distinct - kept,
    );

    Ok(IncidentCleanStats {
        raw,
        distinct,
        kept,
    })
}

/// Cleans the raw offense-code rows.
///
/// Keeps the first row per code in file order, then drops rows that had any
/// null field, then derives the crime type of each survivor. The order
/// matters: a code whose first row has an empty field disappears entirely
/// even if a later duplicate row was complete.
#[must_use]
pub fn clean_offense_codes(rows: &[RawOffenseRow]) -> Vec<OffenseCode> {
    let mut seen = BTreeSet::new();
    let first_per_code: Vec<&RawOffenseRow> = rows
        .iter()
        .filter(|row| seen.insert(CodeKey::of(&row.code)))
        .collect();

    let cleaned: Vec<OffenseCode> = first_per_code
        .iter()
        .filter(|row| !row.has_null)
        .map(|row| OffenseCode::new(&row.code, row.name.as_str()))
        .collect();

    log::info!(
        "Cleaned offense codes: {} rows -> {} distinct codes -> {} complete",
        rows.len(),
        first_per_code.len(),
        cleaned.len()
    );

    cleaned
}

/// Number of offense codes per INSERT statement.
const INSERT_CHUNK_SIZE: usize = 1_000;

/// Creates [`OFFENSE_CODES_TABLE`] in the session and inserts `codes` with
/// multi-row INSERTs.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`StatsError::DuckDb`] if the table cannot be created or an
/// insert fails.
pub fn register_offense_codes(
    session: &Session,
    codes: &[OffenseCode],
) -> Result<u64, StatsError> {
    session.execute_batch(&format!(
        "CREATE OR REPLACE TABLE {OFFENSE_CODES_TABLE} (
            code INTEGER,
            name VARCHAR NOT NULL,
            crime_type VARCHAR NOT NULL
        );"
    ))?;

    let mut inserted = 0u64;
    for chunk in codes.chunks(INSERT_CHUNK_SIZE) {
        let placeholders = vec!["(?, ?, ?)"; chunk.len()].join(", ");
        let mut stmt = session.prepare(&format!(
            "INSERT INTO {OFFENSE_CODES_TABLE} (code, name, crime_type) VALUES {placeholders}"
        ))?;

        let mut param_idx = 1usize;
        for offense in chunk {
            stmt.raw_bind_parameter(param_idx, offense.code)?;
            stmt.raw_bind_parameter(param_idx + 1, &offense.name)?;
            stmt.raw_bind_parameter(param_idx + 2, &offense.crime_type)?;
            param_idx += 3;
        }

        let rows = stmt.raw_execute()?;
        inserted += u64::try_from(rows).unwrap_or(0);
    }

    log::debug!("Registered {inserted} offense codes");
    Ok(inserted)
}

/// Left-joins [`INCIDENTS_TABLE`] to [`OFFENSE_CODES_TABLE`] into
/// [`JOINED_TABLE`], adding a `crime_type` column that is null for
/// incidents without a matching code.
///
/// Returns the number of incidents that matched a code.
///
/// # Errors
///
/// Returns [`StatsError::DuckDb`] if the join fails.
pub fn join_incidents(session: &Session) -> Result<u64, StatsError> {
    session.execute_batch(&format!(
        "CREATE OR REPLACE TABLE {JOINED_TABLE} AS
         SELECT i.*, o.crime_type
         FROM {INCIDENTS_TABLE} i
         LEFT JOIN {OFFENSE_CODES_TABLE} o ON i.OFFENSE_CODE = o.code;"
    ))?;

    let total = session.row_count(JOINED_TABLE)?;
    let matched: i64 = session.query_row(
        &format!("SELECT COUNT(crime_type) FROM {JOINED_TABLE}"),
        [],
        |row| row.get(0),
    )?;
    let matched = u64::try_from(matched).unwrap_or(0);

    log::info!(
        "Joined {total} incidents to offense codes ({matched} matched, {} without a crime type)",
        total - matched
    );
    Ok(matched)
}
