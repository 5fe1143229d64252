//! JSON-lines log backend.
//!
//! Each record is one line of JSON terminated by `\n`. The reader tails the
//! file by byte offset: it only consumes complete lines, so a record that
//! is still being written is picked up on a later call once its newline
//! lands.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tailboard_types::{EventId, EventPayload, LogRecord};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::reader::{LogReader, OrderGuard};

/// Cursor over a `.jsonl` log.
#[derive(Debug)]
pub struct JsonlReader {
    path: PathBuf,
    file: Option<BufReader<File>>,
    offset: u64,
    guard: OrderGuard,
}

impl JsonlReader {
    /// Create a cursor positioned at the start of the log.
    ///
    /// The file is opened lazily, so it may not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            offset: 0,
            guard: OrderGuard::default(),
        }
    }

    /// Byte offset of the first unconsumed line.
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Open the file if it has appeared since the last call.
    fn ensure_file(&mut self) -> Result<Option<&mut BufReader<File>>, StoreError> {
        if self.file.is_none() && self.path.exists() {
            let file = File::open(&self.path)?;
            debug!(path = %self.path.display(), "opened JSON-lines log");
            self.file = Some(BufReader::new(file));
        }
        Ok(self.file.as_mut())
    }
}

impl LogReader for JsonlReader {
    fn next_record(&mut self) -> Result<Option<LogRecord>, StoreError> {
        let mut line = Vec::new();
        loop {
            let start = self.offset;
            let Some(reader) = self.ensure_file()? else {
                return Ok(None);
            };

            reader.seek(SeekFrom::Start(start))?;
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 || line.last() != Some(&b'\n') {
                // Nothing new, or the producer is mid-write.
                return Ok(None);
            }

            let consumed = u64::try_from(read)
                .map_err(|e| StoreError::InvalidId(format!("line length: {e}")))?;
            self.offset = start.saturating_add(consumed);

            let text = line.trim_ascii();
            if text.is_empty() {
                continue;
            }

            let record: LogRecord =
                serde_json::from_slice(text).map_err(|e| StoreError::Decode {
                    location: format!("{}@{start}", self.path.display()),
                    message: e.to_string(),
                })?;

            if !self.guard.admit(record.id) {
                warn!(
                    path = %self.path.display(),
                    id = %record.id,
                    last_id = ?self.guard.last(),
                    "skipping out-of-order record"
                );
                continue;
            }

            return Ok(Some(record));
        }
    }

    fn last_id(&self) -> Option<EventId> {
        self.guard.last()
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Producer side of a `.jsonl` log.
///
/// Ids continue from the highest id already present in the file, so a
/// writer reopened on an existing log keeps them increasing.
#[derive(Debug)]
pub struct JsonlWriter {
    path: PathBuf,
    file: File,
    next_id: EventId,
}

impl JsonlWriter {
    /// Open (or create) a log for appending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be opened or scanned.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let next_id = match highest_id(&path)? {
            Some(id) => id
                .next()
                .ok_or_else(|| StoreError::InvalidId(String::from("id space exhausted")))?,
            None => EventId(1),
        };
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            next_id,
        })
    }

    /// Append a typed payload and return the id it was given.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] or [`StoreError::Io`].
    pub fn append(
        &mut self,
        payload: &EventPayload,
        timestamp: f64,
    ) -> Result<EventId, StoreError> {
        let fields = payload.to_fields()?;
        self.append_raw(payload.kind().wire_name(), fields, timestamp)
    }

    /// Append a record with an arbitrary kind name and field mapping.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] or [`StoreError::Io`].
    pub fn append_raw(
        &mut self,
        kind: &str,
        fields: Map<String, Value>,
        timestamp: f64,
    ) -> Result<EventId, StoreError> {
        let id = self.next_id;
        let record = LogRecord {
            id,
            kind: kind.to_owned(),
            fields,
            timestamp,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;

        self.next_id = id
            .next()
            .ok_or_else(|| StoreError::InvalidId(String::from("id space exhausted")))?;
        Ok(id)
    }

    /// Path of the log being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Scan an existing log for its highest record id. Corrupt lines are
/// ignored.
fn highest_id(path: &Path) -> Result<Option<EventId>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let reader = BufReader::new(File::open(path)?);
    let mut highest: Option<EventId> = None;
    for line in reader.split(b'\n') {
        let line = line?;
        if let Ok(record) = serde_json::from_slice::<LogRecord>(line.trim_ascii()) {
            highest = highest.max(Some(record.id));
        }
    }
    Ok(highest)
}
