use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::logs::{DiscoveryFilter, TailConfig, TailError};

/// Settings from `~/.config/openclaw-tail/config.yaml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Agents root; `$OPENCLAW_STATE_DIR` still takes precedence.
    pub state_dir: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub rescan_interval_ms: u64,
    /// Records shown by `--no-follow` when `--last` is not given.
    pub no_follow_default_count: usize,
    pub watch_events: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            poll_interval_ms: 500,
            rescan_interval_ms: 5000,
            no_follow_default_count: 20,
            watch_events: true,
        }
    }
}

impl FileConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_millis(self.rescan_interval_ms)
    }

    fn validate(self) -> Result<Self, TailError> {
        if self.poll_interval_ms == 0 {
            return Err(TailError::Config("poll_interval_ms must be > 0".into()));
        }
        if self.rescan_interval_ms < self.poll_interval_ms {
            return Err(TailError::Config(format!(
                "rescan_interval_ms ({}) must be >= poll_interval_ms ({})",
                self.rescan_interval_ms, self.poll_interval_ms
            )));
        }
        Ok(self)
    }
}

/// Values given on the command line. Anything set here wins over the file.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub agents: Vec<String>,
    /// `-n`; 0 means not given.
    pub last: usize,
    pub no_follow: bool,
    pub include_deleted: bool,
    pub poll_interval_ms: Option<u64>,
}

/// Combine command-line options with the config file into a run
/// configuration for `root`.
pub fn resolve(
    root: PathBuf,
    cli: &CliOptions,
    file: &FileConfig,
) -> Result<TailConfig, TailError> {
    let poll_interval = cli
        .poll_interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| file.poll_interval());
    if poll_interval.is_zero() {
        return Err(TailError::Config("--poll-interval-ms must be greater than 0".into()));
    }

    let replay_count = if cli.no_follow && cli.last == 0 {
        file.no_follow_default_count
    } else {
        cli.last
    };

    Ok(TailConfig {
        root,
        filter: DiscoveryFilter {
            agents: cli.agents.clone(),
            include_deleted: cli.include_deleted,
        },
        replay_count,
        follow: !cli.no_follow,
        poll_interval,
        rescan_interval: file.rescan_interval().max(poll_interval),
        watch_events: file.watch_events,
    })
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("openclaw-tail").join("config.yaml"))
}

/// Load the config file. An explicitly given path must exist; the default
/// location is optional and falls back to built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(FileConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config {}", path.display()))
}

pub fn parse_config(yaml: &str) -> Result<FileConfig> {
    // An empty file parses as null rather than an empty mapping
    if yaml.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    let config: FileConfig = serde_yaml::from_str(yaml)?;
    Ok(config.validate()?)
}
