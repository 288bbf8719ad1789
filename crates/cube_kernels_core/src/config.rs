//! Client configuration from the process environment.
//!
//! # Responsibility
//! - Read and normalize logging and fixture settings.
//! - Report bad values as typed errors instead of silently defaulting.
//!
//! # Invariants
//! - Unset variables fall back to defaults; set-but-invalid ones are errors.
//! - `log_dir`, when present, is absolute.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const LOG_LEVEL_ENV: &str = "CUBE_KERNELS_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "CUBE_KERNELS_LOG_DIR";
pub const FIXTURE_ENV: &str = "CUBE_KERNELS_FIXTURE";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Log level is not one of `trace|debug|info|warn|error`.
    InvalidLogLevel(String),
    /// Path variable is set but blank or relative.
    InvalidPath { variable: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLogLevel(value) => write!(
                f,
                "unsupported log level `{value}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidPath { variable, value } => {
                write!(f, "{variable} must be an absolute path, got `{value}`")
            }
        }
    }
}

impl Error for ConfigError {}

/// Settings for one client process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub log_level: &'static str,
    /// File logging is disabled when `None`.
    pub log_dir: Option<PathBuf>,
    /// Fixture to seed the in-memory store from; built-in demo when `None`.
    pub fixture: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: None,
            fixture: None,
        }
    }
}

impl ClientConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = match lookup(LOG_LEVEL_ENV) {
            Some(value) => normalize_level(&value)
                .map_err(|_| ConfigError::InvalidLogLevel(value.trim().to_string()))?,
            None => default_log_level(),
        };

        Ok(Self {
            log_level,
            log_dir: absolute_path(LOG_DIR_ENV, lookup(LOG_DIR_ENV))?,
            fixture: absolute_path(FIXTURE_ENV, lookup(FIXTURE_ENV))?,
        })
    }
}

fn absolute_path(
    variable: &'static str,
    value: Option<String>,
) -> Result<Option<PathBuf>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() || !Path::new(trimmed).is_absolute() {
        return Err(ConfigError::InvalidPath { variable, value });
    }
    Ok(Some(PathBuf::from(trimmed)))
}
