//! Configuration management for viewstore
//!
//! Configuration comes from defaults, a TOML file or `VIEWSTORE_*`
//! environment variables, and is validated before use.

use serde::{Deserialize, Serialize};
use std::env;

mod error;

pub use error::ConfigError;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database and index configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Longest accepted index name, in bytes
    pub max_index_name_len: usize,

    /// Drop the modification counters of a view when it is released
    pub forget_released_views: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Register metric descriptions at startup
    pub enabled: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_index_name_len: 255,
            forget_released_views: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Parse variable `name` if it is set
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|value| {
            value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                variable: name.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: VIEWSTORE_<SECTION>_<KEY>
    /// Example: VIEWSTORE_DATABASE_MAX_INDEX_NAME_LEN=64
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Database config
        if let Some(len) = parse_var(&lookup, "VIEWSTORE_DATABASE_MAX_INDEX_NAME_LEN")? {
            config.database.max_index_name_len = len;
        }
        if let Some(forget) = parse_var(&lookup, "VIEWSTORE_DATABASE_FORGET_RELEASED_VIEWS")? {
            config.database.forget_released_views = forget;
        }

        // Logging config
        if let Some(level) = lookup("VIEWSTORE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(json) = parse_var(&lookup, "VIEWSTORE_LOG_JSON")? {
            config.logging.json_format = json;
        }

        // Metrics config
        if let Some(enabled) = parse_var(&lookup, "VIEWSTORE_METRICS_ENABLED")? {
            config.metrics.enabled = enabled;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_index_name_len == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_index_name_len must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        let path = path.as_ref();
        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(())
    }
}
