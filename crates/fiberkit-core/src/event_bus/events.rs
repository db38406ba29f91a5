//! Event type definitions for the event bus.
//!
//! Events are cloneable and serializable so the history can be exported as
//! a run log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{ParamId, ParamValue};
use crate::run::RunState;

/// Root event enum for all application events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// Transport connection events
    Connection(ConnectionEvent),
    /// Run lifecycle and progress
    Run(RunEvent),
    /// Individual command exchanges
    Command(CommandEvent),
    /// Configuration edits
    Config(ConfigEvent),
    /// Syringe bookkeeping and maintenance moves
    Syringe(SyringeEvent),
    /// Free-form operator log lines
    Log(LogEvent),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Connection(_) => EventCategory::Connection,
            AppEvent::Run(_) => EventCategory::Run,
            AppEvent::Command(_) => EventCategory::Command,
            AppEvent::Config(_) => EventCategory::Config,
            AppEvent::Syringe(_) => EventCategory::Syringe,
            AppEvent::Log(_) => EventCategory::Log,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Connection(e) => e.description(),
            AppEvent::Run(e) => e.description(),
            AppEvent::Command(e) => e.description(),
            AppEvent::Config(e) => e.description(),
            AppEvent::Syringe(e) => e.description(),
            AppEvent::Log(e) => e.message.clone(),
        }
    }

    /// Convenience constructor for an info log line
    pub fn info(message: impl Into<String>) -> Self {
        AppEvent::Log(LogEvent::new(LogLevel::Info, message))
    }

    /// Convenience constructor for an error log line
    pub fn error(message: impl Into<String>) -> Self {
        AppEvent::Log(LogEvent::new(LogLevel::Error, message))
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Transport connection events.
    Connection,
    /// Run lifecycle events.
    Run,
    /// Command exchange events.
    Command,
    /// Configuration events.
    Config,
    /// Syringe events.
    Syringe,
    /// Log lines.
    Log,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Connection => write!(f, "Connection"),
            EventCategory::Run => write!(f, "Run"),
            EventCategory::Command => write!(f, "Command"),
            EventCategory::Config => write!(f, "Config"),
            EventCategory::Syringe => write!(f, "Syringe"),
            EventCategory::Log => write!(f, "Log"),
        }
    }
}

/// Connection-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConnectionEvent {
    /// Channel attached, homing in progress.
    Connecting {
        /// Channel description (port name).
        port: String,
    },
    /// Homing acknowledged, ready for runs.
    Connected {
        /// Channel description (port name).
        port: String,
    },
    /// Channel released.
    Disconnected {
        /// Channel description (port name).
        port: String,
    },
    /// Homing handshake failed; the channel was dropped.
    ConnectionFailed {
        /// Channel description (port name).
        port: String,
        /// Error message describing the failure.
        error: String,
    },
}

impl ConnectionEvent {
    fn description(&self) -> String {
        match self {
            ConnectionEvent::Connecting { port } => format!("Connecting to {}", port),
            ConnectionEvent::Connected { port } => {
                format!("Connected to the printer on {}", port)
            }
            ConnectionEvent::Disconnected { port } => {
                format!("Disconnected from the printer on {}", port)
            }
            ConnectionEvent::ConnectionFailed { port, error } => {
                format!("Could not connect to {}: {}", port, error)
            }
        }
    }
}

/// Run lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// Run state machine transition.
    StateChanged {
        /// Previous state.
        from: RunState,
        /// New state.
        to: RunState,
    },
    /// A layer passed its geometry check and is about to be drawn.
    LayerStarted {
        /// Zero-based layer index.
        layer: u32,
        /// Number of scan lines planned for the layer.
        lines: usize,
    },
    /// A scan line is about to be drawn.
    LineStarted {
        /// Zero-based layer index.
        layer: u32,
        /// Zero-based line index within the layer.
        line: usize,
    },
    /// All layers and the footer were acknowledged.
    Finished {
        /// Number of commands acknowledged during the run.
        commands: u64,
    },
    /// The run terminated on an error.
    Failed {
        /// Error message.
        error: String,
    },
    /// The operator stopped the run.
    Cancelled,
}

impl RunEvent {
    fn description(&self) -> String {
        match self {
            RunEvent::StateChanged { from, to } => format!("Run state {} -> {}", from, to),
            RunEvent::LayerStarted { layer, lines } => {
                format!("Layer {} started ({} lines)", layer + 1, lines)
            }
            RunEvent::LineStarted { layer, line } => {
                format!("Layer {} line {}", layer + 1, line + 1)
            }
            RunEvent::Finished { commands } => format!("Finished ({} commands)", commands),
            RunEvent::Failed { error } => format!("Error during run: {}", error),
            RunEvent::Cancelled => "Stopped".to_string(),
        }
    }
}

/// Command exchange events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandEvent {
    /// A command line was written to the channel.
    Sent {
        /// The command text.
        command: String,
    },
    /// The firmware acknowledged the command.
    Acknowledged {
        /// The command text.
        command: String,
        /// Round-trip time in milliseconds.
        elapsed_ms: u64,
    },
}

impl CommandEvent {
    fn description(&self) -> String {
        match self {
            CommandEvent::Sent { command } => format!(">> {}", command),
            CommandEvent::Acknowledged {
                command,
                elapsed_ms,
            } => format!("ok {} ({}ms)", command, elapsed_ms),
        }
    }
}

/// Configuration events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConfigEvent {
    /// A field was written.
    Changed {
        /// The field.
        field: ParamId,
        /// Its new value.
        value: ParamValue,
    },
}

impl ConfigEvent {
    fn description(&self) -> String {
        match self {
            ConfigEvent::Changed { field, value } => format!("{} = {}", field, value),
        }
    }
}

/// Syringe events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyringeEvent {
    /// Plunger moved to a millilitre mark.
    MovedToMark {
        /// The mark (1-5 ml).
        mark: u8,
    },
    /// Material drawn in.
    Intake {
        /// Extruder units drawn.
        units: u32,
    },
    /// Plunger homed against the filament sensor.
    Homed,
}

impl SyringeEvent {
    fn description(&self) -> String {
        match self {
            SyringeEvent::MovedToMark { mark } => format!("Go to {} ml", mark),
            SyringeEvent::Intake { units } => format!("Intake {} units", units),
            SyringeEvent::Homed => "Syringe homed".to_string(),
        }
    }
}

/// Severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// Informational status.
    Info,
    /// Recoverable problem.
    Warning,
    /// Terminal error.
    Error,
}

/// Operator-facing log line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
    /// Wall-clock time the line was produced.
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    /// Create a log line stamped with the current time
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
