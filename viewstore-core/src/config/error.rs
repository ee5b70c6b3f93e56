//! Errors raised while loading, checking or saving a viewstore configuration
//!
//! Configuration comes from a TOML file or from `VIEWSTORE_*` environment
//! variables; file errors carry the path involved.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {reason}", path.display())]
    FileReadError { path: PathBuf, reason: String },

    #[error("Failed to write config file {}: {reason}", path.display())]
    FileWriteError { path: PathBuf, reason: String },

    /// The file is not valid TOML or does not match the config sections
    #[error("Invalid TOML in config file {}: {reason}", path.display())]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to encode config as TOML: {0}")]
    SerializeError(String),

    /// An environment variable could not be parsed into its setting
    #[error("Invalid value for {variable}: {reason}")]
    InvalidValue { variable: String, reason: String },

    /// Values parsed but are out of range
    #[error("Config validation failed: {0}")]
    ValidationFailed(String),
}
