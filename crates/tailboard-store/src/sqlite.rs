//! `SQLite` log backend.
//!
//! Records live in a single `events` table whose integer primary key is the
//! record id. The reader opens the database read-only and fetches one row
//! past the last id it returned, so it never sees an id twice.

use std::path::{Path, PathBuf};

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags, params};
use serde_json::{Map, Value};
use tailboard_types::{EventId, EventPayload, LogRecord};
use tracing::debug;

use crate::error::StoreError;
use crate::reader::{LogReader, OrderGuard};

/// Schema created by [`SqliteWriter`]. `AUTOINCREMENT` keeps ids increasing
/// even if rows are ever removed.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS events (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    kind      TEXT    NOT NULL,
    fields    TEXT    NOT NULL,
    timestamp REAL    NOT NULL
);
";

const SELECT_NEXT: &str = r"
SELECT id, kind, fields, timestamp
  FROM events
 WHERE id > ?1
 ORDER BY id
 LIMIT 1
";

/// Cursor over a `SQLite` log.
#[derive(Debug)]
pub struct SqliteReader {
    path: PathBuf,
    conn: Option<Connection>,
    guard: OrderGuard,
}

impl SqliteReader {
    /// Create a cursor positioned before the first record.
    ///
    /// The database is opened lazily, so it may not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
            guard: OrderGuard::default(),
        }
    }

    fn ensure_conn(&mut self) -> Result<Option<&Connection>, StoreError> {
        if self.conn.is_none() && self.path.exists() {
            let conn = Connection::open_with_flags(
                &self.path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            debug!(path = %self.path.display(), "opened SQLite log");
            self.conn = Some(conn);
        }
        Ok(self.conn.as_ref())
    }
}

impl LogReader for SqliteReader {
    fn next_record(&mut self) -> Result<Option<LogRecord>, StoreError> {
        let after = match self.guard.last() {
            Some(id) => i64::try_from(id.into_inner())
                .map_err(|e| StoreError::InvalidId(format!("{id}: {e}")))?,
            None => 0,
        };

        let Some(conn) = self.ensure_conn()? else {
            return Ok(None);
        };

        // Only the id is typed here. The other columns are checked after the
        // cursor has moved past the row, so a mistyped row is skipped.
        let row = conn.query_row(SELECT_NEXT, params![after], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, SqlValue>(1)?,
                row.get::<_, SqlValue>(2)?,
                row.get::<_, SqlValue>(3)?,
            ))
        });

        let (raw_id, kind, fields, timestamp) = match row {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(err) if is_missing_table(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let id = u64::try_from(raw_id)
            .map(EventId)
            .map_err(|e| StoreError::InvalidId(format!("{raw_id}: {e}")))?;

        // Advance before decoding so a corrupt row is never fetched again.
        if !self.guard.admit(id) {
            return Err(StoreError::InvalidId(format!(
                "row {id} is not beyond {:?}",
                self.guard.last()
            )));
        }

        let corrupt = |message: String| StoreError::Decode {
            location: format!("{}#{id}", self.path.display()),
            message,
        };

        let kind = match kind {
            SqlValue::Text(kind) => kind,
            other => {
                return Err(corrupt(format!("kind is {}, expected text", type_name(&other))));
            }
        };
        let fields = match fields {
            SqlValue::Text(fields) => fields,
            other => {
                return Err(corrupt(format!(
                    "fields is {}, expected text",
                    type_name(&other)
                )));
            }
        };
        let timestamp = match timestamp {
            SqlValue::Real(value) => value,
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Integer(value) => value as f64,
            other => {
                return Err(corrupt(format!(
                    "timestamp is {}, expected a number",
                    type_name(&other)
                )));
            }
        };

        let fields: Map<String, Value> =
            serde_json::from_str(&fields).map_err(|e| corrupt(e.to_string()))?;

        Ok(Some(LogRecord {
            id,
            kind,
            fields,
            timestamp,
        }))
    }

    fn last_id(&self) -> Option<EventId> {
        self.guard.last()
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

fn type_name(value: &SqlValue) -> &'static str {
    match value {
        SqlValue::Null => "null",
        SqlValue::Integer(_) => "integer",
        SqlValue::Real(_) => "real",
        SqlValue::Text(_) => "text",
        SqlValue::Blob(_) => "blob",
    }
}

/// The producer has not created the schema yet.
fn is_missing_table(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(message)) if message.starts_with("no such table")
    )
}

/// Producer side of a `SQLite` log.
#[derive(Debug)]
pub struct SqliteWriter {
    conn: Connection,
}

impl SqliteWriter {
    /// Open (or create) a database and make sure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Append a typed payload and return the id the database assigned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] or [`StoreError::Sqlite`].
    pub fn append(
        &mut self,
        payload: &EventPayload,
        timestamp: f64,
    ) -> Result<EventId, StoreError> {
        let fields = payload.to_fields()?;
        self.append_raw(payload.kind().wire_name(), &fields, timestamp)
    }

    /// Append a record with an arbitrary kind name and field mapping.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] or [`StoreError::Sqlite`].
    pub fn append_raw(
        &mut self,
        kind: &str,
        fields: &Map<String, Value>,
        timestamp: f64,
    ) -> Result<EventId, StoreError> {
        let fields = serde_json::to_string(fields)?;
        self.append_encoded(kind, &fields, timestamp)
    }

    /// Append a record whose fields are already encoded as text. Used to
    /// store payloads verbatim, including malformed ones.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the insert fails.
    pub fn append_encoded(
        &mut self,
        kind: &str,
        fields: &str,
        timestamp: f64,
    ) -> Result<EventId, StoreError> {
        self.conn.execute(
            "INSERT INTO events (kind, fields, timestamp) VALUES (?1, ?2, ?3)",
            params![kind, fields, timestamp],
        )?;
        let raw_id = self.conn.last_insert_rowid();
        u64::try_from(raw_id)
            .map(EventId)
            .map_err(|e| StoreError::InvalidId(format!("{raw_id}: {e}")))
    }
}
