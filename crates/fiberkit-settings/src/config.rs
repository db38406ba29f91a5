//! Application settings for FiberKit
//!
//! Holds what is not part of a project: the serial connection, protocol
//! timeouts, run gate timing and which parameter preset new projects start
//! from. Files are JSON or TOML, chosen by extension, and live in the
//! platform config directory unless a path is given.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fiberkit_core::{Configuration, Preset};
use serde::{Deserialize, Serialize};

use crate::error::{SettingsError, SettingsResult};

/// Directory name under the platform config directory
pub const APP_DIR_NAME: &str = "fiberkit";

/// Default settings file name
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Port value meaning "first matching serial port"
pub const AUTO_PORT: &str = "Auto";

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Port path, or `"Auto"` to pick the first matching port
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Deadline for the homing handshake after opening the port
    pub connect_timeout_ms: u64,
    /// Deadline for each acknowledged command
    pub command_timeout_ms: u64,
    /// Wait after opening the port before homing
    pub settle_delay_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: AUTO_PORT.to_string(),
            baud_rate: 115200,
            connect_timeout_ms: 120_000,
            command_timeout_ms: 30_000,
            settle_delay_ms: 2_000,
        }
    }
}

impl ConnectionSettings {
    /// Whether the port should be auto-detected
    pub fn is_auto_port(&self) -> bool {
        self.port.eq_ignore_ascii_case(AUTO_PORT) || self.port.trim().is_empty()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Run executor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Sleep between checks while a run is paused
    pub pause_poll_ms: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self { pause_poll_ms: 50 }
    }
}

impl RunSettings {
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }
}

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial connection and protocol timeouts
    pub connection: ConnectionSettings,
    /// Run executor timing
    pub run: RunSettings,
    /// Parameter set new projects start from
    pub preset: Preset,
}

impl AppConfig {
    /// Create settings with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Run parameters of the configured preset
    pub fn initial_configuration(&self) -> Configuration {
        Configuration::from_preset(self.preset)
    }

    /// Load settings from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match Format::from_path(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Save settings to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::from_path(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        tracing::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist yet
    pub fn load_or_default() -> SettingsResult<Self> {
        let path = default_settings_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            tracing::info!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate settings
    pub fn validate(&self) -> SettingsResult<()> {
        let nonzero = [
            ("connection.baud_rate", u64::from(self.connection.baud_rate)),
            ("connection.connect_timeout_ms", self.connection.connect_timeout_ms),
            ("connection.command_timeout_ms", self.connection.command_timeout_ms),
            ("run.pause_poll_ms", self.run.pause_poll_ms),
        ];
        for (key, value) in nonzero {
            if value == 0 {
                return Err(SettingsError::InvalidSetting {
                    key: key.to_string(),
                    reason: "must be > 0".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> SettingsResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            Some(other) => Err(SettingsError::UnsupportedFormat(other.to_string())),
            None => Err(SettingsError::UnsupportedFormat(
                "settings file must be .json or .toml".to_string(),
            )),
        }
    }
}

/// Platform config directory for FiberKit
pub fn config_dir() -> SettingsResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| SettingsError::ConfigDirectory("no config directory on this platform".into()))
}

/// Default settings file path
pub fn default_settings_path() -> SettingsResult<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.connection.is_auto_port());
        assert_eq!(config.connection.baud_rate, 115200);
        assert_eq!(config.connection.connect_timeout(), Duration::from_secs(120));
        assert_eq!(config.connection.command_timeout(), Duration::from_secs(30));
        assert_eq!(config.run.pause_poll(), Duration::from_millis(50));
        assert_eq!(config.preset, Preset::AnchoredBench);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = AppConfig::default();
        config.connection.command_timeout_ms = 0;
        match config.validate() {
            Err(SettingsError::InvalidSetting { key, .. }) => {
                assert_eq!(key, "connection.command_timeout_ms")
            }
            other => panic!("expected InvalidSetting, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str("[connection]\nport = \"/dev/ttyACM0\"\n").unwrap();
        assert_eq!(config.connection.port, "/dev/ttyACM0");
        assert!(!config.connection.is_auto_port());
        assert_eq!(config.connection.baud_rate, 115200);
        assert_eq!(config.run, RunSettings::default());
    }

    #[test]
    fn test_unknown_extension() {
        assert!(matches!(
            Format::from_path(Path::new("settings.yaml")),
            Err(SettingsError::UnsupportedFormat(_))
        ));
        assert_eq!(Format::from_path(Path::new("a.JSON")).unwrap(), Format::Json);
    }
}
