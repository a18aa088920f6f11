//! Configuration for data-group members
//!
//! Loaded from YAML with per-module sections; every section has defaults so
//! a partial file (or none at all) is enough to start a member.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(String),
    #[error("cannot parse config file: {0}")]
    Parse(String),
}

/// Member configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberConfig {
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub pull: PullConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

impl MemberConfig {
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Heartbeat and election timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Interval of the heartbeat loop in milliseconds
    pub interval_ms: u64,
    /// Lower bound of the jittered election timeout
    pub election_timeout_min_ms: u64,
    /// Upper bound of the jittered election timeout
    pub election_timeout_max_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            election_timeout_min_ms: 2_000,
            election_timeout_max_ms: 4_000,
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Remote-file and snapshot pulling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PullConfig {
    /// Root of the staging area for files pulled from prior owners
    pub remote_dir: PathBuf,
    /// Per-chunk timeout of a remote read, milliseconds
    pub connection_timeout_ms: u64,
    /// Width of the pull-snapshot worker pool; defaults to the hardware
    /// parallelism when unset
    pub max_workers: Option<usize>,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            remote_dir: PathBuf::from("remote"),
            connection_timeout_ms: 20_000,
            max_workers: None,
        }
    }
}

impl PullConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn workers(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Query-path timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How long a member waits to catch up with its leader before giving up
    pub sync_leader_timeout_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            sync_leader_timeout_ms: 10_000,
        }
    }
}

impl QueryConfig {
    pub fn sync_leader_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_leader_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_missing_sections() {
        let config = MemberConfig::from_yaml("pull:\n  connection_timeout_ms: 50\n").unwrap();
        assert_eq!(config.pull.connection_timeout_ms, 50);
        assert_eq!(config.heartbeat.interval_ms, 500);
        assert_eq!(config.query.sync_leader_timeout_ms, 10_000);
    }

    #[test]
    fn bad_yaml_is_a_parse_error() {
        assert!(matches!(
            MemberConfig::from_yaml(":"),
            Err(ConfigError::Parse(_))
        ));
    }
}
