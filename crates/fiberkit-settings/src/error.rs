//! Error types for the settings crate.

use std::io;
use thiserror::Error;

/// Errors that can occur while loading, saving or validating settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// A settings value is invalid.
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// The file extension is neither `.json` nor `.toml`.
    #[error("Unsupported settings format: {0}")]
    UnsupportedFormat(String),

    /// The configuration directory could not be resolved or created.
    #[error("Config directory error: {0}")]
    ConfigDirectory(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// A run parameter was rejected.
    #[error("Config error: {0}")]
    Config(#[from] fiberkit_core::ConfigError),
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
