//! Append-only experiment log backends for Tailboard.
//!
//! Training processes append records to one log per run; the dashboard
//! engine tails those logs through the [`LogReader`] cursor. Two on-disk
//! formats are supported and selected by file extension.
//!
//! # Architecture
//!
//! ```text
//! Trainer --append--> JsonlWriter / SqliteWriter --> <log_dir>/<env>/<run>.<ext>
//!                                                          |
//! Dashboard <--next_record-- JsonlReader / SqliteReader <--+
//! ```
//!
//! # Modules
//!
//! - [`reader`] -- The [`LogReader`] trait and [`open_cursor`]
//! - [`jsonl`] -- JSON-lines reader and writer
//! - [`sqlite`] -- `SQLite` reader and writer
//! - [`discovery`] -- Finding run logs on disk
//! - [`error`] -- Shared error types

pub mod discovery;
pub mod error;
pub mod jsonl;
pub mod reader;
pub mod sqlite;

// Re-export primary types for convenience.
pub use discovery::{RunLocation, discover_runs, locate_runs};
pub use error::StoreError;
pub use jsonl::{JsonlReader, JsonlWriter};
pub use reader::{LogFormat, LogReader, open_cursor};
pub use sqlite::{SqliteReader, SqliteWriter};
