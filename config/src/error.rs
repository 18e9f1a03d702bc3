//! Error types for settings and database location.

use thiserror::Error;

/// Errors that can occur while loading settings or locating a database.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A setting holds a value outside its allowed range.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    /// No candidate path pointed at an existing file.
    #[error("no database found (tried: {tried})")]
    NoDatabaseFound {
        /// Comma-separated list of the probed paths.
        tried: String,
    },
}

/// Convenience alias for results with [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
