//! Configuration loading and typed config structures for Tailboard.
//!
//! The dashboard reads `tailboard.yaml` (or the file named by
//! `TAILBOARD_CONFIG`). Every field has a default, so an empty or missing
//! file yields a working configuration that watches `logs/default`.
//!
//! Environment variables override the path-like settings:
//! - `TAILBOARD_LOG_DIR` overrides `sources.log_dir`
//! - `TAILBOARD_ENV` overrides `sources.env`
//! - `TAILBOARD_CACHE_DIR` overrides `sources.cache_dir`
//! - `TAILBOARD_OUTPUT_DIR` overrides `output.dir`

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tailboard_types::EventId;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level dashboard configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DashboardConfig {
    /// Where the run logs live and which ones to watch.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Polling cadence and per-source limits.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Video handling.
    #[serde(default)]
    pub media: MediaConfig,

    /// Where rendered artifacts are written.
    #[serde(default)]
    pub output: OutputConfig,
}

impl DashboardConfig {
    /// Load configuration from a YAML file at the given path, then apply
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from `path` if it exists, falling back to
    /// defaults (plus environment overrides) when it does not.
    ///
    /// # Errors
    ///
    /// Same as [`DashboardConfig::from_file`] for an existing file.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides are
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("TAILBOARD_LOG_DIR") {
            self.sources.log_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("TAILBOARD_ENV") {
            self.sources.env = val;
        }
        if let Some(val) = lookup("TAILBOARD_CACHE_DIR") {
            self.sources.cache_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("TAILBOARD_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(val);
        }
    }
}

/// Log source selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourcesConfig {
    /// Directory holding one sub-directory per experiment environment.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Experiment environment to watch (a sub-directory of `log_dir`).
    #[serde(default = "default_env")]
    pub env: String,

    /// Explicit run names. When empty, the newest `run_count` logs are used.
    #[serde(default)]
    pub runs: Vec<String>,

    /// How many of the newest logs to watch when `runs` is empty.
    #[serde(default = "default_run_count")]
    pub run_count: usize,

    /// Root of the per-run media cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl SourcesConfig {
    /// The directory holding the watched environment's logs.
    pub fn env_dir(&self) -> PathBuf {
        self.log_dir.join(&self.env)
    }

    /// The media cache directory for one run.
    pub fn run_cache_dir(&self, run: &str) -> PathBuf {
        self.cache_dir.join(&self.env).join(run)
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            env: default_env(),
            runs: Vec::new(),
            run_count: default_run_count(),
            cache_dir: default_cache_dir(),
        }
    }
}

/// Polling cadence and per-source limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PollingConfig {
    /// Sleep between rounds once no source has anything new.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Records a single source may consume before it is retired.
    #[serde(default = "default_max_events")]
    pub max_events: u64,

    /// Samples at or beyond this step count are skipped.
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Action labels used when the logs do not announce any.
    #[serde(default)]
    pub action_names: Option<Vec<String>>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_events: default_max_events(),
            max_steps: default_max_steps(),
            action_names: None,
        }
    }
}

/// Which heavy samples get an agent-view video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentVideoPolicy {
    /// Never render agent videos.
    #[default]
    Disabled,
    /// Render an agent video for every heavy sample.
    All,
    /// Render agent videos only for these event ids.
    Ids(Vec<u64>),
}

impl AgentVideoPolicy {
    /// Whether the heavy sample with this id should get an agent video.
    pub fn selects(&self, id: EventId) -> bool {
        match self {
            Self::Disabled => false,
            Self::All => true,
            Self::Ids(ids) => ids.contains(&id.into_inner()),
        }
    }
}

/// Video handling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MediaConfig {
    /// Agent-view video selection.
    #[serde(default)]
    pub agent_videos: AgentVideoPolicy,

    /// External program that turns a video job into an mp4. Without one,
    /// agent videos are unavailable.
    #[serde(default)]
    pub command: Option<String>,

    /// Extra arguments passed to `command` before the job and output paths.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Artifact output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives one JSON file per artifact.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_env() -> String {
    "default".to_owned()
}

const fn default_run_count() -> usize {
    2
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

const fn default_interval_ms() -> u64 {
    1000
}

const fn default_max_events() -> u64 {
    10_000_000
}

const fn default_max_steps() -> u64 {
    100_000_000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DashboardConfig::default();
        assert_eq!(config.sources.run_count, 2);
        assert_eq!(config.sources.env_dir(), PathBuf::from("logs/default"));
        assert_eq!(config.polling.interval_ms, 1000);
        assert_eq!(config.polling.max_events, 10_000_000);
        assert_eq!(config.polling.max_steps, 100_000_000);
        assert_eq!(config.media.agent_videos, AgentVideoPolicy::Disabled);
        assert_eq!(config.output.dir, PathBuf::from("artifacts"));
    }

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = DashboardConfig::parse("  \n").ok();
        assert_eq!(config, Some(DashboardConfig::default()));
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
sources:
  log_dir: "/data/logs"
  env: "breakout"
  runs: ["run-a", "run-b", "run-c"]
  cache_dir: "/tmp/cache"

polling:
  interval_ms: 250
  max_events: 500
  max_steps: 2000000
  action_names: ["noop", "fire", "left", "right"]

media:
  agent_videos:
    ids: [3, 7]
  command: "render-video"
  args: ["--fps", "30"]

output:
  dir: "/srv/tailboard"
"#;

        let config = DashboardConfig::parse(yaml);
        let config = config.unwrap();

        assert_eq!(config.sources.env, "breakout");
        assert_eq!(config.sources.runs.len(), 3);
        assert_eq!(config.sources.run_count, 2);
        assert_eq!(
            config.sources.run_cache_dir("run-a"),
            PathBuf::from("/tmp/cache/breakout/run-a")
        );
        assert_eq!(config.polling.interval_ms, 250);
        assert_eq!(config.polling.max_events, 500);
        assert_eq!(config.polling.max_steps, 2_000_000);
        assert_eq!(
            config.polling.action_names.as_deref().map(<[String]>::len),
            Some(4)
        );
        assert_eq!(config.media.agent_videos, AgentVideoPolicy::Ids(vec![3, 7]));
        assert_eq!(config.media.command.as_deref(), Some("render-video"));
        assert_eq!(config.media.args, vec!["--fps", "30"]);
        assert_eq!(config.output.dir, PathBuf::from("/srv/tailboard"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "polling:\n  interval_ms: 10\nmedia:\n  agent_videos: all\n";
        let config = DashboardConfig::parse(yaml);
        let config = config.unwrap();
        assert_eq!(config.polling.interval_ms, 10);
        assert_eq!(config.polling.max_events, 10_000_000);
        assert_eq!(config.media.agent_videos, AgentVideoPolicy::All);
        assert_eq!(config.sources, SourcesConfig::default());
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        let result = DashboardConfig::parse("polling: [not, a, map");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn overrides_replace_paths() {
        let mut config = DashboardConfig::default();
        config.apply_overrides(|key| match key {
            "TAILBOARD_LOG_DIR" => Some("/mnt/logs".to_owned()),
            "TAILBOARD_ENV" => Some("pong".to_owned()),
            "TAILBOARD_OUTPUT_DIR" => Some("/mnt/out".to_owned()),
            _ => None,
        });
        assert_eq!(config.sources.env_dir(), PathBuf::from("/mnt/logs/pong"));
        assert_eq!(config.sources.cache_dir, PathBuf::from("cache"));
        assert_eq!(config.output.dir, PathBuf::from("/mnt/out"));
    }

    #[test]
    fn agent_video_policy_selects_ids() {
        let policy = AgentVideoPolicy::Ids(vec![4]);
        assert!(policy.selects(EventId(4)));
        assert!(!policy.selects(EventId(5)));
        assert!(AgentVideoPolicy::All.selects(EventId(5)));
        assert!(!AgentVideoPolicy::Disabled.selects(EventId(4)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!(
            "tailboard-missing-{}.yaml",
            uuid::Uuid::new_v4()
        ));
        let config = DashboardConfig::load_or_default(&path);
        assert!(config.is_ok());
    }
}
