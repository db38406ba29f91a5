//! FiberKit Settings Crate
//!
//! Application settings (connection, timeouts, preset) and project file
//! persistence.

pub mod config;
pub mod error;
pub mod project;

pub use config::{
    config_dir, default_settings_path, AppConfig, ConnectionSettings, RunSettings, AUTO_PORT,
};
pub use error::{SettingsError, SettingsResult};
pub use project::{load_project, read_project, save_project, ProjectFile};
