//! The [`LogReader`] cursor abstraction and backend selection.

use std::path::Path;

use tailboard_types::{EventId, LogRecord};

use crate::error::StoreError;
use crate::jsonl::JsonlReader;
use crate::sqlite::SqliteReader;

/// A restartable, non-blocking cursor over one append-only log.
///
/// `Ok(None)` means "nothing new right now" and is the normal idle result,
/// never an error. Implementations guarantee that ids strictly increase
/// across successive records. A corrupt record surfaces as
/// [`StoreError::Decode`] and the cursor has already advanced past it.
pub trait LogReader: Send {
    /// Fetch the next unseen record, if one has been appended.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] for a single corrupt record, or a
    /// backend error ([`StoreError::Io`], [`StoreError::Sqlite`]) when the
    /// store itself cannot be read.
    fn next_record(&mut self) -> Result<Option<LogRecord>, StoreError>;

    /// Id of the last record returned, if any.
    fn last_id(&self) -> Option<EventId>;

    /// Path of the underlying store.
    fn path(&self) -> &Path;
}

/// Supported on-disk log formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON record per line.
    JsonLines,
    /// `SQLite` database with an `events` table.
    Sqlite,
}

impl LogFormat {
    /// Every format, in discovery preference order.
    pub const ALL: [Self; 2] = [Self::Sqlite, Self::JsonLines];

    /// File extensions recognized for this format.
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::JsonLines => &["jsonl", "ndjson"],
            Self::Sqlite => &["sqlite3", "sqlite", "db"],
        }
    }

    /// Detect the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&ext))
    }
}

/// Open a cursor over the log at `path`, choosing the backend by extension.
///
/// The file does not need to exist yet; the cursor reports "no new record"
/// until it appears.
///
/// # Errors
///
/// Returns [`StoreError::UnsupportedFormat`] if the extension is unknown.
pub fn open_cursor(path: &Path) -> Result<Box<dyn LogReader>, StoreError> {
    match LogFormat::from_path(path) {
        Some(LogFormat::JsonLines) => Ok(Box::new(JsonlReader::open(path))),
        Some(LogFormat::Sqlite) => Ok(Box::new(SqliteReader::open(path))),
        None => Err(StoreError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Tracks the last id handed out and rejects anything not beyond it.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct OrderGuard {
    last: Option<EventId>,
}

impl OrderGuard {
    /// Accept `id` if it is strictly greater than every id seen so far.
    pub(crate) fn admit(&mut self, id: EventId) -> bool {
        if self.last.is_some_and(|last| id <= last) {
            return false;
        }
        self.last = Some(id);
        true
    }

    /// The last admitted id.
    pub(crate) const fn last(&self) -> Option<EventId> {
        self.last
    }
}
