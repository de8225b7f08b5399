//! `SQLite` source database reader.
//!
//! The source database is a snapshot of the legacy system: one row per
//! person in `people`, with phones, emails, addresses and custom
//! attributes fetched into side tables keyed by `person_id`.

use super::{LoadFailure, RawAddress, RawAttribute, RawCommunication, RawPerson, SourceBatch};
use crate::models::{FieldMapping, FieldMappings, LocalId, RemoteFieldKind};
use crate::services::RecordNormalizer;
use crate::{Error, Result};
use rusqlite::{Connection, OpenFlags, Row, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::instrument;

/// Schema of the source database.
///
/// Used to create fixtures; [`SqliteSource::open`] never writes.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS people (
    id INTEGER PRIMARY KEY,
    household_id INTEGER,
    last_name TEXT,
    first_name TEXT,
    middle_name TEXT,
    goes_by_name TEXT,
    gender TEXT,
    date_of_birth TEXT,
    marital_status TEXT,
    last_updated TEXT
);
CREATE TABLE IF NOT EXISTS fetched_communications (
    person_id INTEGER NOT NULL,
    communication_type TEXT,
    communication_general_type TEXT,
    communication_value TEXT
);
CREATE TABLE IF NOT EXISTS fetched_addresses (
    person_id INTEGER NOT NULL,
    address1 TEXT,
    address2 TEXT,
    city TEXT,
    st_province TEXT,
    postal_code TEXT
);
CREATE TABLE IF NOT EXISTS fetched_attributes (
    person_id INTEGER NOT NULL,
    attribute_id INTEGER NOT NULL,
    value TEXT
);
CREATE TABLE IF NOT EXISTS field_mapping (
    f1_id INTEGER PRIMARY KEY,
    pco_field_id TEXT NOT NULL,
    pco_field_kind TEXT
);
";

const PEOPLE_COLUMNS: &str = "id, household_id, first_name, last_name, middle_name, \
     goes_by_name, gender, date_of_birth, marital_status, last_updated";

/// Which rows of the sorted `people` table to load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceWindow {
    /// Index of the first row to load.
    pub start: usize,
    /// Index one past the last row to load; `None` reads to the end.
    pub end: Option<usize>,
    /// Only load these primary keys; empty loads everything.
    pub ids: Vec<i64>,
}

impl SourceWindow {
    /// Loads every row.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the load to rows `start..end`.
    #[must_use]
    pub const fn with_range(mut self, start: usize, end: Option<usize>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Restricts the load to the given primary keys.
    #[must_use]
    pub fn with_ids(mut self, ids: Vec<i64>) -> Self {
        self.ids = ids;
        self
    }

    fn limit(&self) -> i64 {
        // SQLite treats a negative LIMIT as unbounded.
        self.end.map_or(-1, |end| {
            i64::try_from(end.saturating_sub(self.start)).unwrap_or(i64::MAX)
        })
    }

    fn offset(&self) -> i64 {
        i64::try_from(self.start).unwrap_or(i64::MAX)
    }
}

/// Reads local person records from a source `SQLite` database.
pub struct SqliteSource {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl SqliteSource {
    /// Opens an existing source database read-only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be opened.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::OperationFailed {
            operation: "open_source_db".to_string(),
            cause: format!("{}: {e}", db_path.display()),
        })?;

        Ok(Self {
            conn,
            db_path: Some(db_path),
        })
    }

    /// Creates an empty in-memory source with the schema applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::failed("open_source_db_in_memory", e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::failed("create_source_schema", e))?;
        Ok(Self {
            conn,
            db_path: None,
        })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Runs raw SQL against the source; used to seed in-memory fixtures.
    ///
    /// # Errors
    ///
    /// Returns an error if the statements fail.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| Error::failed("execute_source_sql", e))
    }

    /// Loads and normalizes the rows selected by `window`.
    ///
    /// Rows are ordered by last name, then first name (case-insensitive),
    /// then primary key, so near-duplicates end up next to each other.
    /// Rows whose columns cannot be decoded become [`LoadFailure`]s.
    ///
    /// # Errors
    ///
    /// Returns an error if the query itself fails.
    #[instrument(skip(self, normalizer), fields(start = window.start, end = ?window.end, ids = window.ids.len()))]
    pub fn load(&self, window: &SourceWindow, normalizer: &RecordNormalizer) -> Result<SourceBatch> {
        let started = Instant::now();
        let rows = self.load_raw(window)?;

        let mut batch = SourceBatch::default();
        for row in rows {
            match row {
                Ok(raw) => batch.records.push(normalizer.normalize(&raw)),
                Err(failure) => {
                    tracing::warn!(
                        record = %failure.id,
                        cause = %failure.cause,
                        "Source row could not be decoded"
                    );
                    batch.failures.push(failure);
                },
            }
        }

        metrics::histogram!("peoplesync_source_load_duration_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            records = batch.records.len(),
            failures = batch.failures.len(),
            "Loaded local batch"
        );
        Ok(batch)
    }

    /// Loads the custom attribute to remote field mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the `field_mapping` table cannot be read.
    pub fn field_mappings(&self) -> Result<FieldMappings> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT f1_id, CAST(pco_field_id AS TEXT), COALESCE(pco_field_kind, 'text') \
                 FROM field_mapping ORDER BY f1_id",
            )
            .map_err(|e| Error::failed("prepare_field_mappings", e))?;

        let mappings = stmt
            .query_map([], |row| {
                let kind: String = row.get(2)?;
                Ok(FieldMapping {
                    local_attribute_id: row.get(0)?,
                    remote_field_id: row.get(1)?,
                    remote_field_kind: RemoteFieldKind::parse(&kind),
                })
            })
            .map_err(|e| Error::failed("query_field_mappings", e))?
            .collect::<rusqlite::Result<FieldMappings>>()
            .map_err(|e| Error::failed("read_field_mappings", e))?;

        tracing::debug!(count = mappings.len(), "Loaded field mappings");
        Ok(mappings)
    }

    fn load_raw(&self, window: &SourceWindow) -> Result<Vec<std::result::Result<RawPerson, LoadFailure>>> {
        let filter = if window.ids.is_empty() {
            String::new()
        } else {
            let placeholders = vec!["?"; window.ids.len()].join(", ");
            format!("WHERE id IN ({placeholders})")
        };
        let sql = format!(
            "SELECT {PEOPLE_COLUMNS} FROM people {filter} \
             ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE, id \
             LIMIT ? OFFSET ?"
        );

        let mut values = window.ids.clone();
        values.push(window.limit());
        values.push(window.offset());

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| Error::failed("prepare_load_people", e))?;
        let mut rows = stmt
            .query(params_from_iter(values.iter()))
            .map_err(|e| Error::failed("query_people", e))?;

        let mut loaded = Vec::new();
        while let Some(row) = rows.next().map_err(|e| Error::failed("read_people", e))? {
            let id: i64 = row.get(0).map_err(|e| Error::failed("read_person_id", e))?;
            let decoded = Self::decode_person(row)
                .and_then(|mut person| self.attach_children(&mut person).map(|()| person))
                .map_err(|e| LoadFailure {
                    id: LocalId(id),
                    cause: e.to_string(),
                });
            loaded.push(decoded);
        }
        Ok(loaded)
    }

    fn decode_person(row: &Row<'_>) -> rusqlite::Result<RawPerson> {
        Ok(RawPerson {
            id: row.get(0)?,
            household_id: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            middle_name: row.get(4)?,
            goes_by_name: row.get(5)?,
            gender: row.get(6)?,
            date_of_birth: row.get(7)?,
            marital_status: row.get(8)?,
            last_updated: row.get(9)?,
            ..RawPerson::default()
        })
    }

    fn attach_children(&self, person: &mut RawPerson) -> rusqlite::Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT COALESCE(communication_type, ''), COALESCE(communication_general_type, ''), \
             COALESCE(communication_value, '') \
             FROM fetched_communications WHERE person_id = ?1 ORDER BY rowid",
        )?;
        person.communications = stmt
            .query_map(params![person.id], |row| {
                Ok(RawCommunication {
                    communication_type: row.get(0)?,
                    general_type: row.get(1)?,
                    value: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        let mut stmt = self.conn.prepare_cached(
            "SELECT address1, address2, city, st_province, postal_code \
             FROM fetched_addresses WHERE person_id = ?1 ORDER BY rowid",
        )?;
        person.addresses = stmt
            .query_map(params![person.id], |row| {
                Ok(RawAddress {
                    address1: row.get(0)?,
                    address2: row.get(1)?,
                    city: row.get(2)?,
                    st_province: row.get(3)?,
                    postal_code: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        let mut stmt = self.conn.prepare_cached(
            "SELECT attribute_id, value FROM fetched_attributes \
             WHERE person_id = ?1 ORDER BY rowid",
        )?;
        person.attributes = stmt
            .query_map(params![person.id], |row| {
                Ok(RawAttribute {
                    attribute_id: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        Ok(())
    }
}
