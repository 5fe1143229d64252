//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tailboard_store::{LogReader, StoreError};
use tailboard_types::{EventId, LogRecord};

/// A cursor that replays a fixed script, then reports "no new record".
pub(crate) struct ScriptedReader {
    script: VecDeque<Result<Option<LogRecord>, StoreError>>,
    path: PathBuf,
    last: Option<EventId>,
}

impl ScriptedReader {
    pub(crate) fn new(
        path: impl Into<PathBuf>,
        script: Vec<Result<Option<LogRecord>, StoreError>>,
    ) -> Self {
        Self {
            script: script.into(),
            path: path.into(),
            last: None,
        }
    }
}

impl LogReader for ScriptedReader {
    fn next_record(&mut self) -> Result<Option<LogRecord>, StoreError> {
        let next = self.script.pop_front().unwrap_or(Ok(None));
        if let Ok(Some(record)) = &next {
            self.last = Some(record.id);
        }
        next
    }

    fn last_id(&self) -> Option<EventId> {
        self.last
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

pub(crate) fn record(id: u64, kind: &str, fields: &Value) -> Result<Option<LogRecord>, StoreError> {
    Ok(Some(LogRecord {
        id: EventId(id),
        kind: kind.to_owned(),
        fields: fields.as_object().cloned().unwrap_or_default(),
        timestamp: 0.0,
    }))
}
