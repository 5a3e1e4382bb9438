//! Pipeline configuration.
//!
//! # Storage layout
//!
//! ```text
//! <config_dir>/nanoship/config.yaml   (optional; every field has a default)
//! ```
//!
//! # API pattern
//!
//! - `load_at(path)`: explicit file; a missing file is an error
//! - `load_or_default_at(path)`: a missing file yields defaults
//! - `load(explicit)`: resolves the default location via `dirs::config_dir()`
//!
//! Tests must use the `_at` forms so they never read the real config dir.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Layout, RemoteTarget};

pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 5.0;
/// A batch with at least this many raw files is archived even while acquiring.
pub const DEFAULT_BATCH_THRESHOLD: usize = 1000;

/// Substrings that together identify a running sequencing experiment in the
/// process table.
pub const DEFAULT_PROCESS_MARKERS: [&str; 3] = ["MinKNOW", "experiment", "sequencing"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub poll_interval_secs: f64,
    pub batch_threshold: usize,
    pub layout: Layout,
    pub remote: RemoteConfig,
    pub activity: ActivityConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            layout: Layout::default(),
            remote: RemoteConfig::default(),
            activity: ActivityConfig::default(),
        }
    }
}

/// Remote settings; each may also come from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub host: Option<String>,
    pub user: Option<String>,
    pub dir: Option<PathBuf>,
}

/// Inputs of the acquisition-activity probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivityConfig {
    /// All markers must appear in one process command line.
    pub process_markers: Vec<String>,
    /// While this file exists, acquisition is considered active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_file: Option<PathBuf>,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            process_markers: DEFAULT_PROCESS_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            lock_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

impl PipelineConfig {
    /// Check the values that have no meaningful fallback.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.poll_interval()?;
        if self.batch_threshold == 0 {
            return Err(ConfigError::Invalid {
                setting: "batch_threshold",
                message: "must be at least 1".to_string(),
            });
        }
        for (setting, value) in [
            ("layout.pass_marker", &self.layout.pass_marker),
            ("layout.raw_extension", &self.layout.raw_extension),
            ("layout.archive_extension", &self.layout.archive_extension),
            ("layout.data_kind", &self.layout.data_kind),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    setting,
                    message: "must not be empty".to_string(),
                });
            }
        }
        if self.layout.raw_extension == self.layout.archive_extension {
            return Err(ConfigError::Invalid {
                setting: "layout.archive_extension",
                message: "must differ from layout.raw_extension".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(self.poll_interval_secs).map_err(|err| {
            ConfigError::Invalid {
                setting: "poll_interval_secs",
                message: format!("{} ({err})", self.poll_interval_secs),
            }
        })
    }

    /// Resolve the remote target; the user falls back to the login name.
    pub fn remote_target(&self) -> Result<RemoteTarget, ConfigError> {
        let host = self.remote.host.clone().ok_or(ConfigError::Missing {
            setting: "remote.host",
            hint: "pass --remote-host or set remote.host in config.yaml",
        })?;
        let dir = self.remote.dir.clone().ok_or(ConfigError::Missing {
            setting: "remote.dir",
            hint: "pass --remote-dir or set remote.dir in config.yaml",
        })?;
        let user = self
            .remote
            .user
            .clone()
            .or_else(default_user)
            .ok_or(ConfigError::Missing {
                setting: "remote.user",
                hint: "pass --remote-user or set remote.user in config.yaml",
            })?;
        Ok(RemoteTarget { host, user, dir })
    }
}

/// Login name of the current user, from `$USER` or `$USERNAME`.
pub fn default_user() -> Option<String> {
    ["USER", "USERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// `<config_dir>/nanoship/config.yaml`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nanoship").join("config.yaml"))
}

/// Load and validate `path`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // An empty file deserializes to `()` rather than a mapping.
    let config = if contents.trim().is_empty() {
        PipelineConfig::default()
    } else {
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };
    config.validate()?;
    Ok(config)
}

/// Like [`load_at`], but a missing file yields [`PipelineConfig::default`].
pub fn load_or_default_at(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        return Ok(PipelineConfig::default());
    }
    load_at(path)
}

/// Load `explicit` if given, otherwise the default location (if any).
pub fn load(explicit: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    match explicit {
        Some(path) => load_at(path),
        None => match default_path() {
            Some(path) => load_or_default_at(&path),
            None => Ok(PipelineConfig::default()),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_instrument_conventions() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_threshold, 1000);
        assert_eq!(config.poll_interval().unwrap(), Duration::from_secs(5));
        assert_eq!(config.layout.pass_marker, "fast5_pass");
        assert_eq!(
            config.activity.process_markers,
            vec!["MinKNOW", "experiment", "sequencing"]
        );
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn negative_interval_is_invalid() {
        let config = PipelineConfig {
            poll_interval_secs: -1.0,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                setting: "poll_interval_secs",
                ..
            }
        ));
    }

    #[test]
    fn remote_target_requires_host_and_dir() {
        let mut config = PipelineConfig::default();
        config.remote.user = Some("alice".to_string());
        assert!(matches!(
            config.remote_target().unwrap_err(),
            ConfigError::Missing {
                setting: "remote.host",
                ..
            }
        ));

        config.remote.host = Some("dtn.example.org".to_string());
        assert!(matches!(
            config.remote_target().unwrap_err(),
            ConfigError::Missing {
                setting: "remote.dir",
                ..
            }
        ));

        config.remote.dir = Some(PathBuf::from("/raw"));
        let target = config.remote_target().expect("resolved");
        assert_eq!(target.login(), "alice@dtn.example.org");
    }
}
