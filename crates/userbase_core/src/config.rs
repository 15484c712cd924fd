//! Runtime configuration for embedding callers.
//!
//! # Responsibility
//! - Resolve database path, logging and paging defaults from the environment.
//! - Reject malformed or out-of-range values before anything is opened.
//!
//! # Invariants
//! - Blank environment values are treated as unset.
//! - `default_page_size` and `search_limit` stay within the service bounds.

use crate::logging::{default_log_level, normalize_level};
use crate::service::user_service::{PAGE_SIZE_MAX, SEARCH_LIMIT_MAX};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "USERBASE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "USERBASE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "USERBASE_LOG_DIR";
pub const ENV_PAGE_SIZE: &str = "USERBASE_PAGE_SIZE";
pub const ENV_SEARCH_LIMIT: &str = "USERBASE_SEARCH_LIMIT";

const DEFAULT_DB_FILE_NAME: &str = "userbase.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber {
        key: &'static str,
        value: String,
    },
    OutOfRange {
        key: &'static str,
        value: u32,
        max: u32,
    },
    InvalidLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { key, value } => {
                write!(f, "{key} must be a positive integer, got `{value}`")
            }
            Self::OutOfRange { key, value, max } => {
                write!(f, "{key} must be between 1 and {max}, got {value}")
            }
            Self::InvalidLogLevel(level) => write!(f, "unsupported log level `{level}`"),
        }
    }
}

impl Error for ConfigError {}

/// Settings shared by the CLI and other embedding callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: &'static str,
    /// File logging is disabled when `None`.
    pub log_dir: Option<PathBuf>,
    pub default_page_size: u32,
    pub search_limit: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level(),
            log_dir: None,
            default_page_size: crate::dto::DEFAULT_PAGE_SIZE,
            search_limit: crate::repo::user_repo::SEARCH_DEFAULT_LIMIT,
        }
    }
}

impl CoreConfig {
    /// Reads `USERBASE_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level =
                normalize_level(&level).map_err(|_| ConfigError::InvalidLogLevel(level))?;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = read(ENV_PAGE_SIZE) {
            config.default_page_size = parse_bounded(ENV_PAGE_SIZE, &raw, PAGE_SIZE_MAX)?;
        }
        if let Some(raw) = read(ENV_SEARCH_LIMIT) {
            config.search_limit = parse_bounded(ENV_SEARCH_LIMIT, &raw, SEARCH_LIMIT_MAX)?;
        }

        Ok(config)
    }
}

fn parse_bounded(key: &'static str, raw: &str, max: u32) -> Result<u32, ConfigError> {
    let value: u32 = raw.parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })?;
    if value == 0 || value > max {
        return Err(ConfigError::OutOfRange { key, value, max });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_and_blank_values_fall_back_to_defaults() {
        let config = CoreConfig::from_lookup(lookup_from(&[(ENV_DB_PATH, "   ")])).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.search_limit, 10);
    }

    #[test]
    fn values_are_read_and_normalized() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            (ENV_DB_PATH, " /var/lib/userbase.db "),
            (ENV_LOG_LEVEL, "WARNING"),
            (ENV_LOG_DIR, "/var/log/userbase"),
            (ENV_PAGE_SIZE, "50"),
            (ENV_SEARCH_LIMIT, "5"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/var/lib/userbase.db"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/userbase")));
        assert_eq!(config.default_page_size, 50);
        assert_eq!(config.search_limit, 5);
    }

    #[test]
    fn out_of_range_and_malformed_numbers_are_rejected() {
        let err = CoreConfig::from_lookup(lookup_from(&[(ENV_PAGE_SIZE, "101")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::OutOfRange {
                key: ENV_PAGE_SIZE,
                value: 101,
                max: 100
            }
        );

        let err = CoreConfig::from_lookup(lookup_from(&[(ENV_SEARCH_LIMIT, "ten")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let err = CoreConfig::from_lookup(lookup_from(&[(ENV_LOG_LEVEL, "loud")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidLogLevel("loud".to_string()));
    }
}
