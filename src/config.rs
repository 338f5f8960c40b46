//! Startup settings.
//!
//! Built-in defaults, then an optional `settings.json` in the platform config dir,
//! then environment variables. Both client ids are required: a missing one is fatal.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::artwork::DEFAULT_UPLOAD_ENDPOINT;

pub const APP_NAME: &str = "nowcast";
pub const SETTINGS_FILE: &str = "settings.json";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// One day
pub const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

#[cfg(target_os = "windows")]
const DEFAULT_WATCH_PROCESS: Option<&str> = Some("AppleMusic.exe");
#[cfg(not(target_os = "windows"))]
const DEFAULT_WATCH_PROCESS: Option<&str> = None;

pub const ENV_DISCORD_CLIENT_ID: &str = "DISCORD_CLIENT_ID";
pub const ENV_IMGUR_CLIENT_ID: &str = "IMGUR_CLIENT_ID";
pub const ENV_POLL_INTERVAL: &str = "NOWCAST_POLL_INTERVAL";
pub const ENV_WATCH_PROCESS: &str = "NOWCAST_WATCH_PROCESS";
pub const ENV_UPLOAD_ENDPOINT: &str = "NOWCAST_UPLOAD_ENDPOINT";
pub const ENV_LOG_DIR: &str = "NOWCAST_LOG_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("malformed settings file {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no home directory to derive the log directory from; set NOWCAST_LOG_DIR")]
    NoLogDir,
}

/// Shape of `settings.json`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub discord_client_id: Option<String>,
    pub imgur_client_id: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub watch_process: Option<String>,
    pub upload_endpoint: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl FileSettings {
    /// A missing file is the same as an empty one
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub discord_client_id: String,
    pub imgur_client_id: String,
    pub poll_interval: Duration,
    /// `None` leaves liveness to the media session alone
    pub watch_process: Option<String>,
    pub upload_endpoint: String,
    pub log_dir: PathBuf,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Where `settings.json` is looked up
pub fn settings_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
}

fn default_log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_local_dir().join("logs"))
}

/// Blank strings count as unset
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let file = match settings_path() {
            Some(path) => {
                tracing::debug!("[Config] Reading {}", path.display());
                FileSettings::read(&path)?
            }
            None => FileSettings::default(),
        };
        Self::resolve(file, |key| env::var(key).ok(), default_log_dir())
    }

    /// Layer `lookup` (environment) over `file` over defaults, then validate.
    pub fn resolve<F>(file: FileSettings, lookup: F, fallback_log_dir: Option<PathBuf>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let layered = |key: &str, from_file: Option<String>| non_blank(lookup(key)).or(non_blank(from_file));

        let discord_client_id = layered(ENV_DISCORD_CLIENT_ID, file.discord_client_id)
            .ok_or(ConfigError::Missing(ENV_DISCORD_CLIENT_ID))?;
        if !discord_client_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid {
                key: ENV_DISCORD_CLIENT_ID,
                value: discord_client_id,
                reason: "application ids are numeric",
            });
        }

        let imgur_client_id =
            layered(ENV_IMGUR_CLIENT_ID, file.imgur_client_id).ok_or(ConfigError::Missing(ENV_IMGUR_CLIENT_ID))?;

        let poll_interval_secs = match non_blank(lookup(ENV_POLL_INTERVAL)) {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: ENV_POLL_INTERVAL,
                value: raw.clone(),
                reason: "expected whole seconds",
            })?,
            None => file.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        };
        if poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_POLL_INTERVAL,
                value: poll_interval_secs.to_string(),
                reason: "must be at least 1 second",
            });
        }
        if poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(ConfigError::Invalid {
                key: ENV_POLL_INTERVAL,
                value: poll_interval_secs.to_string(),
                reason: "must be at most one day",
            });
        }

        // An explicitly empty value switches the process check off
        let watch_process = match lookup(ENV_WATCH_PROCESS).or(file.watch_process) {
            Some(raw) => non_blank(Some(raw)),
            None => DEFAULT_WATCH_PROCESS.map(str::to_string),
        };

        let upload_endpoint = layered(ENV_UPLOAD_ENDPOINT, file.upload_endpoint)
            .unwrap_or_else(|| DEFAULT_UPLOAD_ENDPOINT.to_string());

        let log_dir = non_blank(lookup(ENV_LOG_DIR))
            .map(PathBuf::from)
            .or(file.log_dir)
            .or(fallback_log_dir)
            .ok_or(ConfigError::NoLogDir)?;

        Ok(Self {
            discord_client_id,
            imgur_client_id,
            poll_interval: Duration::from_secs(poll_interval_secs),
            watch_process,
            upload_endpoint,
            log_dir,
        })
    }
}
