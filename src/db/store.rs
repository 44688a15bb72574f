//! SQLite database store implementation.
//!
//! Every operation opens its own connection and runs in its own
//! transaction, so the polling task and any reader can use the store at
//! the same time. Public operations never return errors: faults are
//! logged and the operation degrades to a no-op or an empty result.

use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::models::*;
use crate::probe::Classification;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Handle to the on-disk ping log.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Create a store at the given path and make sure the schema exists.
    ///
    /// A failing schema setup is logged; the store is still returned and
    /// later operations report their own failures.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store.initialize();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, DbError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Create the schema if absent. Safe to call any number of times.
    pub fn initialize(&self) {
        if let Err(e) = self.init() {
            tracing::error!("Error creating database table in {}: {}", self.path.display(), e);
        }
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.connect()?;

        // WAL lets a reader query while the poller appends.
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::debug!("Database journal mode is {}", mode);
        }

        conn.execute_batch(include_str!("../../migrations/000001_ping_logs.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;

        Ok(())
    }

    // --- Writes ---

    /// Append one record. Storage faults are logged and swallowed.
    pub fn append(&self, record: &PingRecord) {
        if let Err(e) = self.insert(record) {
            tracing::error!("Error logging ping for {} to database: {}", record.target(), e);
        }
    }

    fn insert(&self, record: &PingRecord) -> Result<i64, DbError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO ping_logs (classification, timestamp, target) VALUES (?1, ?2, ?3)",
            params![
                record.classification().as_str(),
                record.timestamp(),
                record.target(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// Delete every record whose id is in `ids`. Unknown ids are ignored.
    pub fn delete(&self, ids: &[i64]) {
        if let Err(e) = self.delete_by_ids(ids) {
            tracing::error!("Error deleting {} logs: {}", ids.len(), e);
        }
    }

    fn delete_by_ids(&self, ids: &[i64]) -> Result<(), DbError> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM ping_logs WHERE id = ?1")?;
            for id in ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // --- Reads ---

    /// Fetch records matching `filter`, newest first.
    ///
    /// Records sharing a timestamp come back in insertion order. On a
    /// storage fault the error is logged and an empty list returned.
    pub fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        match self.select(filter) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Error fetching logs: {}", e);
                Vec::new()
            }
        }
    }

    fn select(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, DbError> {
        let conn = self.connect()?;

        let mut sql =
            String::from("SELECT id, classification, timestamp, target FROM ping_logs WHERE 1=1");
        let mut args: Vec<String> = Vec::new();

        if let Some(target) = filter.target_substring() {
            sql.push_str(" AND instr(target, ?) > 0");
            args.push(target.to_string());
        }
        if let Some(classification) = filter.classification {
            sql.push_str(" AND classification = ?");
            args.push(classification.as_str().to_string());
        }
        if let Some(from) = filter.from_bound() {
            sql.push_str(" AND timestamp >= ?");
            args.push(from);
        }
        if let Some(to) = filter.to_bound() {
            sql.push_str(" AND timestamp <= ?");
            args.push(to);
        }
        sql.push_str(" ORDER BY timestamp DESC, id ASC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            let classification: String = row.get(1)?;
            let classification = classification
                .parse::<Classification>()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;
            Ok(LogEntry {
                id: row.get(0)?,
                record: PingRecord::from_row(classification, row.get(2)?, row.get(3)?),
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            match row {
                Ok(entry) => entries.push(entry),
                // Rows written by something else with a foreign classification.
                Err(rusqlite::Error::FromSqlConversionFailure(_, _, e)) => {
                    tracing::warn!("Skipping log row: {}", e);
                }
                Err(rusqlite::Error::InvalidColumnType(..)) => {
                    tracing::warn!("Skipping log row with a non-text column");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(entries)
    }

    /// Number of records `query` can return, or zero on a storage fault.
    ///
    /// Rows with a foreign classification are not counted, matching what
    /// `query` skips.
    pub fn count(&self) -> i64 {
        let result = self.connect().and_then(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM ping_logs WHERE classification IN (?1, ?2)",
                params![
                    Classification::Success.as_str(),
                    Classification::Failure.as_str()
                ],
                |r| r.get::<_, i64>(0),
            )
            .map_err(DbError::from)
        });
        match result {
            Ok(count) => count,
            Err(e) => {
                tracing::error!("Error counting logs: {}", e);
                0
            }
        }
    }
}
