//! # FiberKit
//!
//! Driver for a fiber deposition stage running Marlin-style firmware over
//! a serial line:
//! - Plans scan paths (an anchored rectangle with serpentine lines, or the
//!   cup-indexed legacy scan) inside a configured safe area
//! - Streams one acknowledged command at a time, with busy handling and a
//!   fixed per-command deadline
//! - Lets an operator pause, resume or stop a run between any two commands
//! - Keeps a running ledger of syringe material
//!
//! ## Architecture
//!
//! FiberKit is organized as a workspace with multiple crates:
//!
//! 1. **fiberkit-core** - Configuration store, run state, errors, events
//! 2. **fiberkit-planner** - Work rectangle and scan line geometry
//! 3. **fiberkit-communication** - Serial channel, protocol, sequencer, controller
//! 4. **fiberkit-settings** - Application settings and project files
//! 5. **fiberkit** - Logging setup and the command-line runner

use std::sync::Arc;

pub use fiberkit_communication::{
    firmware, list_ports, render_program, ControllerSettings, LineChannel, MachineController,
    SerialLineChannel, SerialPortInfo,
};
pub use fiberkit_core::{
    event_bus, ConfigStore, Configuration, Error, Mode, Rect, Result, RunControl, RunState,
};
pub use fiberkit_planner::{draw_rectangle, plan_layer, LayerPlan};
pub use fiberkit_settings::{AppConfig, ProjectFile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Console output, pretty or JSON lines
/// - RUST_LOG environment variable support
/// - Thread names, so executor lines are told apart from the caller
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

/// Controller timing from application settings
pub fn controller_settings(config: &AppConfig) -> ControllerSettings {
    ControllerSettings {
        connect_timeout: config.connection.connect_timeout(),
        command_timeout: config.connection.command_timeout(),
        settle_delay: config.connection.settle_delay(),
        pause_poll: config.run.pause_poll(),
    }
}

/// Open the serial channel named in the settings, or the first matching
/// port when it is set to `"Auto"`
pub fn open_channel(config: &AppConfig) -> Result<Box<dyn LineChannel>> {
    let baud = config.connection.baud_rate;
    let channel = if config.connection.is_auto_port() {
        SerialLineChannel::open_first(baud)?
    } else {
        SerialLineChannel::open(&config.connection.port, baud)?
    };
    Ok(Box::new(channel))
}

/// Build a controller for `config` on the process-wide event bus
pub fn build_controller(config: &AppConfig, parameters: &Configuration) -> MachineController {
    let store = Arc::new(ConfigStore::with_event_bus(parameters, event_bus::event_bus()));
    MachineController::new(store, controller_settings(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_controller_settings_follow_app_config() {
        let mut config = AppConfig::default();
        config.connection.command_timeout_ms = 1_500;
        config.run.pause_poll_ms = 10;
        let settings = controller_settings(&config);
        assert_eq!(settings.command_timeout, Duration::from_millis(1_500));
        assert_eq!(settings.connect_timeout, Duration::from_secs(120));
        assert_eq!(settings.settle_delay, Duration::from_secs(2));
        assert_eq!(settings.pause_poll, Duration::from_millis(10));
    }

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
        assert!(!BUILD_DATE.is_empty());
    }
}
