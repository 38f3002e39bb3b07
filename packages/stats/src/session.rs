//! Scoped `DuckDB` compute session.
//!
//! One in-memory connection holds every intermediate table of a run. The
//! connection is closed when the [`Session`] is dropped, so intermediate
//! state never outlives the run on either the success or the error path.

use std::ops::Deref;

use duckdb::Connection;

use crate::StatsError;

/// Engine resource limits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Worker threads the engine may use. `None` keeps the engine default
    /// (one per core).
    pub threads: Option<u32>,
    /// Memory limit in `DuckDB` size syntax (e.g. `"2GB"`). `None` keeps the
    /// engine default.
    pub memory_limit: Option<String>,
}

/// An open compute session.
///
/// Derefs to the underlying [`Connection`].
pub struct Session {
    conn: Connection,
}

impl Session {
    /// Opens an in-memory session and applies the resource limits.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::DuckDb`] if the connection cannot be opened or a
    /// setting is rejected.
    pub fn open(config: &SessionConfig) -> Result<Self, StatsError> {
        let conn = Connection::open_in_memory()?;

        if let Some(threads) = config.threads {
            conn.execute_batch(&format!("SET threads = {threads};"))?;
        }
        if let Some(limit) = &config.memory_limit {
            conn.execute_batch(&format!(
                "SET memory_limit = '{}';",
                limit.replace('\'', "''")
            ))?;
        }
        // Keeps scan order stable so deduplication and output are repeatable.
        conn.execute_batch("SET preserve_insertion_order = true;")?;

        log::debug!(
            "Opened compute session (threads={:?}, memory_limit={:?})",
            config.threads,
            config.memory_limit
        );

        Ok(Self { conn })
    }

    /// Returns the number of rows in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::DuckDb`] if the table does not exist.
    pub fn row_count(&self, table: &str) -> Result<u64, StatsError> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Returns the column names of `table` in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::DuckDb`] if the catalog query fails.
    pub fn column_names(&self, table: &str) -> Result<Vec<String>, StatsError> {
        let mut stmt = self.conn.prepare(
            "SELECT column_name FROM information_schema.columns
             WHERE table_name = ?
             ORDER BY ordinal_position",
        )?;
        let names = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

impl Deref for Session {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        log::debug!("Closing compute session");
    }
}
