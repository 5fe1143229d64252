//! Turning configuration into watched sources.

use tailboard_core::{DashboardConfig, PollerSettings, RunState, SourcePoller};
use tailboard_store::{RunLocation, discover_runs, locate_runs, open_cursor};
use tracing::info;

use crate::error::AppError;

/// The logs to watch: the configured run names, or the newest
/// `run_count` logs in the environment directory.
pub fn resolve_runs(config: &DashboardConfig) -> Result<Vec<RunLocation>, AppError> {
    let sources = &config.sources;
    let env_dir = sources.env_dir();
    let runs = if sources.runs.is_empty() {
        discover_runs(&env_dir, sources.run_count)?
    } else {
        locate_runs(&env_dir, &sources.runs)
    };
    if runs.is_empty() {
        return Err(AppError::NoRuns { dir: env_dir });
    }
    Ok(runs)
}

/// Open a cursor and fresh run state for every run, in the given order.
pub fn build_pollers(
    config: &DashboardConfig,
    runs: &[RunLocation],
) -> Result<Vec<SourcePoller>, AppError> {
    let settings = PollerSettings::from_config(config);
    runs.iter()
        .map(|run| {
            let reader = open_cursor(&run.log_path)?;
            let cache_dir = config.sources.run_cache_dir(&run.name);
            std::fs::create_dir_all(&cache_dir).map_err(|source| AppError::CacheDir {
                dir: cache_dir.clone(),
                source,
            })?;
            let state = RunState::new(&run.name, cache_dir)
                .with_action_names(config.polling.action_names.clone());
            info!(
                run = %run.name,
                log = %run.log_path.display(),
                "Watching run"
            );
            Ok(SourcePoller::new(reader, state, settings.clone()))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn temp_logs() -> PathBuf {
        let root = std::env::temp_dir().join(format!("tailboard-src-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(root.join("pong")).unwrap();
        root
    }

    fn config(log_dir: &std::path::Path, runs: &[&str]) -> DashboardConfig {
        let mut config = DashboardConfig::default();
        config.sources.log_dir = log_dir.to_path_buf();
        config.sources.env = "pong".to_owned();
        config.sources.cache_dir = log_dir.join("cache");
        config.sources.runs = runs.iter().map(|run| (*run).to_owned()).collect();
        config.polling.action_names = Some(vec!["noop".to_owned()]);
        config
    }

    #[test]
    fn named_runs_are_located() {
        let root = temp_logs();
        std::fs::write(root.join("pong").join("a.jsonl"), b"").unwrap();
        let config = config(&root, &["a", "b"]);

        let runs = resolve_runs(&config).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].log_path, root.join("pong").join("a.jsonl"));

        let pollers = build_pollers(&config, &runs).unwrap();
        assert_eq!(pollers[1].name(), "b");
        assert!(root.join("cache").join("pong").join("b").is_dir());
        assert_eq!(
            pollers[0].state().action_names(),
            Some(&["noop".to_owned()][..])
        );
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn empty_environment_has_no_runs() {
        let root = temp_logs();
        let result = resolve_runs(&config(&root, &[]));
        assert!(matches!(result, Err(AppError::NoRuns { .. })));
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn newest_logs_are_discovered() {
        let root = temp_logs();
        std::fs::write(root.join("pong").join("old.jsonl"), b"").unwrap();
        std::fs::write(root.join("pong").join("notes.txt"), b"").unwrap();
        let runs = resolve_runs(&config(&root, &[])).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].name, "old");
        std::fs::remove_dir_all(&root).unwrap();
    }
}
