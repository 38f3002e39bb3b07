#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Crime record and district summary types for the Boston crimes statistics job.
//!
//! This crate defines the column names expected in the raw input tables, the
//! cleaned offense-code record with its derived crime type, and the
//! per-district summary row written to the output table. It performs no I/O.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Delimiter separating the crime type from the offense detail in `NAME`.
pub const CRIME_TYPE_DELIMITER: &str = " - ";

/// Separator used when joining the most frequent crime types of a district.
pub const CRIME_TYPE_SEPARATOR: &str = ", ";

/// Maximum number of crime types listed per district.
pub const FREQUENT_CRIME_TYPES_LIMIT: usize = 3;

/// Columns that must be present in `crime.csv`.
///
/// Names serialize exactly as they appear in the published header row.
/// Lookups against a loaded table are case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum IncidentColumn {
    /// Unique incident identifier
    #[strum(serialize = "INCIDENT_NUMBER")]
    IncidentNumber,
    /// Offense code, joined against [`OffenseColumn::Code`]
    #[strum(serialize = "OFFENSE_CODE")]
    OffenseCode,
    /// Police district code
    #[strum(serialize = "DISTRICT")]
    District,
    /// Year the incident occurred
    #[strum(serialize = "YEAR")]
    Year,
    /// Month the incident occurred
    #[strum(serialize = "MONTH")]
    Month,
    /// Latitude
    #[strum(serialize = "Lat")]
    Lat,
    /// Longitude
    #[strum(serialize = "Long")]
    Long,
}

impl IncidentColumn {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::IncidentNumber,
            Self::OffenseCode,
            Self::District,
            Self::Year,
            Self::Month,
            Self::Lat,
            Self::Long,
        ]
    }

    /// Whether a null in this column removes the incident during cleaning.
    #[must_use]
    pub const fn is_required_non_null(self) -> bool {
        matches!(self, Self::District | Self::Lat | Self::Long)
    }
}

/// Columns that must be present in `offense_codes.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum OffenseColumn {
    /// Offense code
    #[strum(serialize = "CODE")]
    Code,
    /// Offense description, source of the crime type
    #[strum(serialize = "NAME")]
    Name,
}

/// How the monthly incident median is computed per district.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MedianStrategy {
    /// Discrete exact median: always an observed monthly count, the lower
    /// middle value for an even number of months
    #[default]
    Exact,
    /// t-digest estimate with bounded memory
    Approximate,
}

/// Text encoding of the input CSV files.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum InputEncoding {
    /// UTF-8; invalid sequences are replaced with U+FFFD
    #[default]
    #[serde(rename = "utf-8")]
    #[strum(to_string = "utf-8", serialize = "utf8")]
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value, so
    /// 0x80-0x9F decode to C1 controls rather than Windows-1252 punctuation.
    /// The engine's `latin-1` CSV decoding behaves the same way.
    #[serde(rename = "latin-1")]
    #[strum(to_string = "latin-1", serialize = "latin1")]
    Latin1,
}

impl InputEncoding {
    /// Decodes a raw CSV field into text.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().copied().map(char::from).collect(),
        }
    }
}

/// Derives the coarse crime type from an offense description.
///
/// Takes the text before the first `" - "` and removes every comma. Commas
/// are deleted, not replaced, so `"ASSAULT, SIMPLE"` becomes
/// `"ASSAULT SIMPLE"`.
#[must_use]
pub fn crime_type(name: &str) -> String {
    let head = name
        .split(CRIME_TYPE_DELIMITER)
        .next()
        .unwrap_or_default();
    head.replace(',', "")
}

/// Parses an offense code the way the engine's `TRY_CAST(... AS INTEGER)`
/// does on the incident side, so both sides of the join agree.
///
/// Surrounding whitespace is ignored. Decimal text such as `"613.0"` is
/// accepted and rounded half away from zero. Anything else, or a value
/// outside the `i32` range, yields `None`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_offense_code(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if let Ok(code) = raw.parse::<i32>() {
        return Some(code);
    }

    let value = raw.parse::<f64>().ok().filter(|v| v.is_finite())?.round();
    (f64::from(i32::MIN)..=f64::from(i32::MAX))
        .contains(&value)
        .then_some(value as i32)
}

/// A cleaned row of the offense-code lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffenseCode {
    /// Integer code, `None` when the source value was not numeric.
    pub code: Option<i32>,
    /// Full offense description.
    pub name: String,
    /// Coarse category derived from [`Self::name`].
    pub crime_type: String,
}

impl OffenseCode {
    /// Builds a record from raw `CODE` and `NAME` values, deriving the crime
    /// type.
    #[must_use]
    pub fn new(code: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: parse_offense_code(code),
            crime_type: crime_type(&name),
            name,
        }
    }
}

/// One output row: statistics for a single police district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictSummary {
    /// District code.
    pub district: String,
    /// Number of incidents recorded in the district.
    pub crimes_total: i64,
    /// Median number of incidents per (year, month).
    pub crimes_monthly: i64,
    /// Up to [`FREQUENT_CRIME_TYPES_LIMIT`] crime types, most frequent first,
    /// joined by [`CRIME_TYPE_SEPARATOR`].
    pub frequent_crime_types: String,
    /// Mean latitude of the district's incidents.
    pub lat: f64,
    /// Mean longitude of the district's incidents.
    pub lng: f64,
}

impl DistrictSummary {
    /// Splits [`Self::frequent_crime_types`] back into its entries.
    #[must_use]
    pub fn crime_types(&self) -> Vec<&str> {
        if self.frequent_crime_types.is_empty() {
            return Vec::new();
        }
        self.frequent_crime_types
            .split(CRIME_TYPE_SEPARATOR)
            .collect()
    }
}
