//! Locating run logs on disk.
//!
//! Logs are laid out as `<log_dir>/<env>/<run>.<ext>`. Either the caller
//! names the runs explicitly, or the newest `count` logs of an env are
//! picked by creation time (modification time where the platform does not
//! record creation).

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::error::StoreError;
use crate::reader::LogFormat;

/// A run log found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLocation {
    /// Run name (the file stem).
    pub name: String,
    /// Path of the log file.
    pub log_path: PathBuf,
}

/// Find the newest `count` logs in `env_dir`, newest first.
///
/// Files with unsupported extensions are ignored. Ties on timestamp are
/// broken by name so the result is deterministic.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the directory cannot be listed.
pub fn discover_runs(env_dir: &Path, count: usize) -> Result<Vec<RunLocation>, StoreError> {
    let mut found: Vec<(SystemTime, RunLocation)> = Vec::new();

    for entry in std::fs::read_dir(env_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || LogFormat::from_path(&path).is_none() {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
            continue;
        };
        let metadata = entry.metadata()?;
        let born = metadata
            .created()
            .or_else(|_| metadata.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((born, RunLocation {
            name,
            log_path: path,
        }));
    }

    found.sort_by(|(a_time, a), (b_time, b)| b_time.cmp(a_time).then_with(|| a.name.cmp(&b.name)));
    found.truncate(count);

    debug!(
        env_dir = %env_dir.display(),
        runs = found.len(),
        "discovered run logs"
    );
    Ok(found.into_iter().map(|(_, run)| run).collect())
}

/// Resolve explicitly named runs inside `env_dir`.
///
/// For each name the first existing file with a supported extension wins.
/// When none exists yet the run is expected as `<name>.sqlite3`; its cursor
/// stays idle until the producer creates it.
pub fn locate_runs(env_dir: &Path, names: &[String]) -> Vec<RunLocation> {
    names
        .iter()
        .map(|name| {
            let existing = LogFormat::ALL
                .into_iter()
                .flat_map(|format| format.extensions().iter())
                .map(|ext| env_dir.join(format!("{name}.{ext}")))
                .find(|path| path.is_file());
            RunLocation {
                name: name.clone(),
                log_path: existing.unwrap_or_else(|| env_dir.join(format!("{name}.sqlite3"))),
            }
        })
        .collect()
}
