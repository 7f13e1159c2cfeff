//! Worker configuration
//!
//! A YAML file supplies defaults; command-line flags override it. The
//! default location is `<config_dir>/sift/worker.yaml`, and a missing
//! default file simply means "all defaults".

use crate::logging::{LogFormat, LogLevel};
use crate::status::{validate_marker, MarkerError, DEFAULT_MARKER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid status marker: {0}")]
    Marker(#[from] MarkerError),
}

/// Settings for one worker process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Identifier stamped into claimed stages; the OS process id when unset
    pub vpid: Option<String>,
    /// Program answering control-channel commands
    pub control_command: Option<PathBuf>,
    /// Fixed arguments passed to `control_command` before the command name
    pub control_args: Vec<String>,
    /// Token framing each status line
    pub status_marker: String,
    /// Supervisor registration pin announced at startup
    pub pin: Option<String>,
    /// Worker type announced at startup
    pub worker_type: String,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            vpid: None,
            control_command: None,
            control_args: Vec::new(),
            status_marker: DEFAULT_MARKER.to_string(),
            pin: None,
            worker_type: "extract".to_string(),
            log_level: LogLevel::Info,
            log_format: LogFormat::Text,
        }
    }
}

impl WorkerConfig {
    /// Load from an explicit file; the file must exist.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as null; treat it as all defaults.
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the default file when it exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(default) if default.is_file() => Self::from_file(&default),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_marker(&self.status_marker)?;
        Ok(())
    }

    /// The configured vpid, or `<pid>` of this process.
    pub fn resolved_vpid(&self) -> String {
        self.vpid
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| std::process::id().to_string())
    }
}

/// `<config_dir>/sift/worker.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sift").join("worker.yaml"))
}
