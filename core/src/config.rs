use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime configuration, constructed once at process start and passed
/// explicitly to the components that need it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Destination store for archives, state, lock and sinks.
    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    #[serde(default = "default_daily_keep")]
    pub daily_keep: usize,

    #[serde(default = "default_weekly_keep")]
    pub weekly_keep: usize,

    #[serde(default = "default_monthly_keep")]
    pub monthly_keep: usize,

    /// Comma-separated glob patterns excluded from every backup.
    #[serde(default)]
    pub exclude: String,

    /// Event log path; defaults to `events.log` at the destination.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Notification sink path; defaults to `notifications.log` at the destination.
    #[serde(default)]
    pub notify_file: Option<PathBuf>,
}

fn default_destination() -> PathBuf {
    PathBuf::from("/var/backups/dirvault")
}

fn default_daily_keep() -> usize {
    7
}

fn default_weekly_keep() -> usize {
    4
}

fn default_monthly_keep() -> usize {
    6
}

impl Default for Config {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            daily_keep: default_daily_keep(),
            weekly_keep: default_weekly_keep(),
            monthly_keep: default_monthly_keep(),
            exclude: String::new(),
            log_file: None,
            notify_file: None,
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, falling back to the default
    /// location and then to built-in defaults when no file exists.
    ///
    /// An explicitly named file that is missing is an error; a missing file
    /// at the default location is not.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::ConfigMissing {
                        path: path.display().to_string(),
                    });
                }
                Self::from_file(path).await
            }
            None => match Self::default_path() {
                Some(ref default) if default.exists() => Self::from_file(default).await,
                _ => Ok(Self::default()),
            },
        }
    }

    async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "dirvault")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Exclusion patterns: split on commas, trimmed, empty entries dropped.
    pub fn exclude_patterns(&self) -> Vec<String> {
        self.exclude
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.destination.join("events.log"))
    }

    pub fn notify_path(&self) -> PathBuf {
        self.notify_file
            .clone()
            .unwrap_or_else(|| self.destination.join("notifications.log"))
    }
}
