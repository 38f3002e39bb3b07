//! Per-district aggregates over the joined incident table and their merge.
//!
//! | Table | Grain | Columns |
//! |-------|-------|---------|
//! | `district_totals` | district | `crimes_total`, `lat`, `lng` |
//! | `district_monthly` | district | `crimes_monthly` |
//! | `district_top_crime_types` | district | `frequent_crime_types` |
//! | `district_summary` | district | all of the above, inner-joined |
//!
//! The three aggregates are independent; each reads only
//! [`JOINED_TABLE`](crate::clean::JOINED_TABLE).

use boston_crimes_crime_models::{
    CRIME_TYPE_SEPARATOR, DistrictSummary, FREQUENT_CRIME_TYPES_LIMIT, MedianStrategy,
};

use crate::StatsError;
use crate::clean::JOINED_TABLE;
use crate::session::Session;

/// Count, mean latitude and mean longitude per district.
pub const TOTALS_TABLE: &str = "district_totals";

/// Median monthly incident count per district.
pub const MONTHLY_TABLE: &str = "district_monthly";

/// Most frequent crime types per district.
pub const TOP_CRIME_TYPES_TABLE: &str = "district_top_crime_types";

/// Final merged output table.
pub const SUMMARY_TABLE: &str = "district_summary";

/// Builds [`TOTALS_TABLE`]: incidents with a non-null identifier, and the
/// mean coordinates, per district.
///
/// Returns the number of districts.
///
/// # Errors
///
/// Returns [`StatsError::DuckDb`] if the aggregation fails.
pub fn district_totals(session: &Session) -> Result<u64, StatsError> {
    session.execute_batch(&format!(
        "CREATE OR REPLACE TABLE {TOTALS_TABLE} AS
         SELECT
             CAST(DISTRICT AS VARCHAR) AS district,
             COUNT(INCIDENT_NUMBER) AS crimes_total,
             AVG(CAST(Lat AS DOUBLE)) AS lat,
             AVG(CAST(\"Long\" AS DOUBLE)) AS lng
         FROM {JOINED_TABLE}
         GROUP BY ALL;"
    ))?;

    let districts = session.row_count(TOTALS_TABLE)?;
    log::info!("Computed totals for {districts} districts");
    Ok(districts)
}

/// Builds [`MONTHLY_TABLE`]: counts incidents per (district, year, month),
/// then takes the median of those counts per district using `strategy`.
///
/// Returns the number of districts.
///
/// # Errors
///
/// Returns [`StatsError::DuckDb`] if the aggregation fails.
pub fn district_monthly(session: &Session, strategy: MedianStrategy) -> Result<u64, StatsError> {
    let median = median_expr(strategy, "crimes_by_month");

    session.execute_batch(&format!(
        "CREATE OR REPLACE TABLE {MONTHLY_TABLE} AS
         WITH monthly_counts AS (
             SELECT
                 CAST(DISTRICT AS VARCHAR) AS district,
                 \"YEAR\",
                 \"MONTH\",
                 COUNT(INCIDENT_NUMBER) AS crimes_by_month
             FROM {JOINED_TABLE}
             GROUP BY ALL
         )
         SELECT district, CAST({median} AS BIGINT) AS crimes_monthly
         FROM monthly_counts
         GROUP BY district;"
    ))?;

    let districts = session.row_count(MONTHLY_TABLE)?;
    log::info!("Computed {strategy} monthly medians for {districts} districts");
    Ok(districts)
}

/// Builds [`TOP_CRIME_TYPES_TABLE`]: the [`FREQUENT_CRIME_TYPES_LIMIT`]
/// most frequent crime types per district, joined by
/// [`CRIME_TYPE_SEPARATOR`] in rank order.
///
/// Incidents without a crime type do not form a bucket. Equal frequencies
/// are ranked by crime type in ascending order.
///
/// Returns the number of districts.
///
/// # Errors
///
/// Returns [`StatsError::DuckDb`] if the aggregation fails.
pub fn district_top_crime_types(session: &Session) -> Result<u64, StatsError> {
    session.execute_batch(&format!(
        "CREATE OR REPLACE TABLE {TOP_CRIME_TYPES_TABLE} AS
         WITH crime_counts AS (
             SELECT
                 CAST(DISTRICT AS VARCHAR) AS district,
                 crime_type,
                 COUNT(*) AS frequency
             FROM {JOINED_TABLE}
             WHERE crime_type IS NOT NULL
             GROUP BY ALL
         ),
         ranked AS (
             SELECT
                 district,
                 crime_type,
                 row_number() OVER (
                     PARTITION BY district
                     ORDER BY frequency DESC, crime_type ASC
                 ) AS type_rank
             FROM crime_counts
         )
         SELECT
             district,
             string_agg(crime_type, '{separator}' ORDER BY type_rank) AS frequent_crime_types
         FROM ranked
         WHERE type_rank <= {limit}
         GROUP BY district;",
        separator = CRIME_TYPE_SEPARATOR,
        limit = FREQUENT_CRIME_TYPES_LIMIT,
    ))?;

    let districts = session.row_count(TOP_CRIME_TYPES_TABLE)?;
    log::info!("Ranked crime types for {districts} districts");
    Ok(districts)
}

/// Inner-joins the three aggregates into [`SUMMARY_TABLE`] with the output
/// column order, sorted by district.
///
/// Districts missing from any aggregate are dropped.
///
/// Returns the number of districts kept.
///
/// # Errors
///
/// Returns [`StatsError::DuckDb`] if the join fails.
pub fn merge_summary(session: &Session) -> Result<u64, StatsError> {
    session.execute_batch(&format!(
        "CREATE OR REPLACE TABLE {SUMMARY_TABLE} AS
         SELECT
             t.district,
             t.crimes_total,
             m.crimes_monthly,
             f.frequent_crime_types,
             t.lat,
             t.lng
         FROM {TOTALS_TABLE} t
         JOIN {MONTHLY_TABLE} m ON m.district = t.district
         JOIN {TOP_CRIME_TYPES_TABLE} f ON f.district = t.district
         ORDER BY t.district;"
    ))?;

    let kept = session.row_count(SUMMARY_TABLE)?;
    let totals = session.row_count(TOTALS_TABLE)?;
    if kept < totals {
        log::warn!(
            "{} of {totals} districts were missing from an aggregate and were dropped",
            totals - kept
        );
    }
    log::info!("Merged summary for {kept} districts");
    Ok(kept)
}

/// Reads [`SUMMARY_TABLE`] back as typed rows, ordered by district.
///
/// # Errors
///
/// Returns [`StatsError::DuckDb`] if the query or a row conversion fails.
pub fn summary_rows(session: &Session) -> Result<Vec<DistrictSummary>, StatsError> {
    let mut stmt = session.prepare(&format!(
        "SELECT district, crimes_total, crimes_monthly, frequent_crime_types, lat, lng
         FROM {SUMMARY_TABLE}
         ORDER BY district"
    ))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(DistrictSummary {
                district: row.get(0)?,
                crimes_total: row.get(1)?,
                crimes_monthly: row.get(2)?,
                frequent_crime_types: row.get(3)?,
                lat: row.get(4)?,
                lng: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn median_expr(strategy: MedianStrategy, column: &str) -> String {
    match strategy {
        MedianStrategy::Exact => format!("quantile_disc({column}, 0.5)"),
        MedianStrategy::Approximate => format!("approx_quantile({column}, 0.5)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;

    /// Session with a `joined_incidents` table built from
    /// `(district, year, month, crime_type, count)` groups.
    fn session_with_joined(groups: &[(&str, i64, i64, Option<&str>, usize)]) -> Session {
        let session = Session::open(&SessionConfig::default()).unwrap();
        session
            .execute_batch(
                "CREATE TABLE joined_incidents (
                    INCIDENT_NUMBER VARCHAR,
                    DISTRICT VARCHAR,
                    \"YEAR\" BIGINT,
                    \"MONTH\" BIGINT,
                    Lat DOUBLE,
                    \"Long\" DOUBLE,
                    crime_type VARCHAR
                 );",
            )
            .unwrap();

        let mut id = 0;
        for &(district, year, month, crime_type, count) in groups {
            for _ in 0..count {
                id += 1;
                session
                    .execute(
                        "INSERT INTO joined_incidents VALUES (?, ?, ?, ?, 42.0, -71.0, ?)",
                        duckdb::params![format!("I{id}"), district, year, month, crime_type],
                    )
                    .unwrap();
            }
        }
        session
    }

    fn top_types(session: &Session, district: &str) -> String {
        session
            .query_row(
                "SELECT frequent_crime_types FROM district_top_crime_types WHERE district = ?",
                [district],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn single_district_summary() {
        // 10 incidents over three months (5, 3, 2) with types A:6, B:3, C:1.
        let session = session_with_joined(&[
            ("D4", 2018, 1, Some("A"), 5),
            ("D4", 2018, 2, Some("A"), 1),
            ("D4", 2018, 2, Some("B"), 2),
            ("D4", 2018, 3, Some("B"), 1),
            ("D4", 2018, 3, Some("C"), 1),
        ]);

        assert_eq!(district_totals(&session).unwrap(), 1);
        assert_eq!(district_monthly(&session, MedianStrategy::Exact).unwrap(), 1);
        assert_eq!(district_top_crime_types(&session).unwrap(), 1);
        assert_eq!(merge_summary(&session).unwrap(), 1);

        let rows = summary_rows(&session).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.district, "D4");
        assert_eq!(row.crimes_total, 10);
        assert_eq!(row.crimes_monthly, 3);
        assert_eq!(row.frequent_crime_types, "A, B, C");
        assert!((row.lat - 42.0).abs() < 1e-9);
        assert!((row.lng - -71.0).abs() < 1e-9);
    }

    fn monthly_median(session: &Session) -> i64 {
        session
            .query_row("SELECT crimes_monthly FROM district_monthly", [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[test]
    fn exact_median_of_even_month_count_is_the_lower_middle_value() {
        let session = session_with_joined(&[
            ("B2", 2017, 1, Some("A"), 2),
            ("B2", 2017, 2, Some("A"), 4),
            ("B2", 2017, 3, Some("A"), 6),
            ("B2", 2017, 4, Some("A"), 8),
        ]);

        district_monthly(&session, MedianStrategy::Exact).unwrap();
        assert_eq!(monthly_median(&session), 4);
    }

    #[test]
    fn exact_median_of_two_months_is_the_smaller_count() {
        let session = session_with_joined(&[
            ("B2", 2017, 1, Some("A"), 9),
            ("B2", 2017, 2, Some("A"), 1),
        ]);

        district_monthly(&session, MedianStrategy::Exact).unwrap();
        assert_eq!(monthly_median(&session), 1);
    }

    #[test]
    fn approximate_median_stays_within_observed_counts() {
        let session = session_with_joined(&[
            ("B2", 2017, 1, Some("A"), 5),
            ("B2", 2017, 2, Some("A"), 3),
            ("B2", 2017, 3, Some("A"), 2),
        ]);

        district_monthly(&session, MedianStrategy::Approximate).unwrap();
        let median = monthly_median(&session);
        assert!((2..=5).contains(&median), "median {median} out of range");
    }

    #[test]
    fn months_are_distinguished_by_year() {
        let session = session_with_joined(&[
            ("A1", 2016, 6, Some("A"), 1),
            ("A1", 2017, 6, Some("A"), 1),
            ("A1", 2018, 6, Some("A"), 7),
        ]);

        district_monthly(&session, MedianStrategy::Exact).unwrap();
        let median = monthly_median(&session);
        assert_eq!(median, 1);
    }

    #[test]
    fn top_crime_types_are_limited_and_ordered() {
        let session = session_with_joined(&[
            ("C6", 2018, 1, Some("LARCENY"), 2),
            ("C6", 2018, 1, Some("ASSAULT"), 5),
            ("C6", 2018, 1, Some("VANDALISM"), 3),
            ("C6", 2018, 1, Some("ROBBERY"), 1),
            ("C6", 2018, 1, None, 9),
        ]);

        district_top_crime_types(&session).unwrap();
        assert_eq!(top_types(&session, "C6"), "ASSAULT, VANDALISM, LARCENY");
    }

    #[test]
    fn ties_are_broken_lexicographically() {
        let session = session_with_joined(&[
            ("E5", 2018, 1, Some("ZETA"), 2),
            ("E5", 2018, 1, Some("ALPHA"), 2),
            ("E5", 2018, 1, Some("MU"), 2),
            ("E5", 2018, 1, Some("BETA"), 2),
        ]);

        district_top_crime_types(&session).unwrap();
        assert_eq!(top_types(&session, "E5"), "ALPHA, BETA, MU");
    }

    #[test]
    fn centroid_is_the_mean_of_incident_coordinates() {
        let session = session_with_joined(&[("C11", 2018, 1, Some("A"), 1)]);
        session
            .execute_batch(
                "INSERT INTO joined_incidents VALUES
                    ('X1', 'A1', 2018, 1, 42.0, -71.0, 'A'),
                    ('X2', 'A1', 2018, 1, 42.4, -71.2, 'A'),
                    ('X3', 'A1', 2018, 2, 42.2, -71.6, 'B');",
            )
            .unwrap();

        assert_eq!(district_totals(&session).unwrap(), 2);
        let (lat, lng): (f64, f64) = session
            .query_row(
                "SELECT lat, lng FROM district_totals WHERE district = 'A1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!((lat - 42.2).abs() < 1e-9, "lat {lat}");
        assert!((lng - -71.266_666_666_666_67).abs() < 1e-9, "lng {lng}");
    }

    #[test]
    fn unmatched_incidents_count_toward_totals_only() {
        let session = session_with_joined(&[
            ("D14", 2018, 1, Some("A"), 1),
            ("D14", 2018, 1, None, 4),
        ]);

        district_totals(&session).unwrap();
        district_top_crime_types(&session).unwrap();

        let total: i64 = session
            .query_row("SELECT crimes_total FROM district_totals", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(top_types(&session, "D14"), "A");
    }

    #[test]
    fn districts_missing_an_aggregate_are_dropped() {
        let session = session_with_joined(&[
            ("A1", 2018, 1, Some("A"), 3),
            ("B2", 2018, 1, None, 2),
        ]);

        assert_eq!(district_totals(&session).unwrap(), 2);
        assert_eq!(district_monthly(&session, MedianStrategy::Exact).unwrap(), 2);
        assert_eq!(district_top_crime_types(&session).unwrap(), 1);
        assert_eq!(merge_summary(&session).unwrap(), 1);

        let rows = summary_rows(&session).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].district, "A1");
    }

    #[test]
    fn summary_rows_are_sorted_by_district() {
        let session = session_with_joined(&[
            ("E18", 2018, 1, Some("A"), 1),
            ("A1", 2018, 1, Some("B"), 1),
            ("C11", 2018, 1, Some("C"), 1),
        ]);

        district_totals(&session).unwrap();
        district_monthly(&session, MedianStrategy::Exact).unwrap();
        district_top_crime_types(&session).unwrap();
        merge_summary(&session).unwrap();

        let districts: Vec<String> = summary_rows(&session)
            .unwrap()
            .into_iter()
            .map(|row| row.district)
            .collect();
        assert_eq!(districts, ["A1", "C11", "E18"]);
    }
}
