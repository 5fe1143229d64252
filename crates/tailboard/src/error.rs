//! Error types for the Tailboard binary.
//!
//! [`AppError`] is the top-level error type that wraps every failure mode
//! during startup and polling.

use std::path::PathBuf;

/// Top-level error for the Tailboard binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tailboard_core::ConfigError,
    },

    /// Listing or opening a log failed.
    #[error("log store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: tailboard_store::StoreError,
    },

    /// Building the engine failed.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: tailboard_core::EngineError,
    },

    /// The polling loop failed.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: tailboard_core::SchedulerError,
    },

    /// Creating a run cache directory failed.
    #[error("cannot create cache dir {}: {source}", dir.display())]
    CacheDir {
        /// The directory that could not be created.
        dir: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// No log was found to watch.
    #[error("no run logs found in {}", dir.display())]
    NoRuns {
        /// The directory that was searched.
        dir: PathBuf,
    },
}
