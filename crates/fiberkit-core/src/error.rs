//! Error handling for FiberKit
//!
//! Provides the error types for all layers of the application:
//! - Configuration errors (unknown fields, mistyped values)
//! - Geometry errors (invalid scan parameters, rectangles outside the safe area)
//! - Protocol errors (firmware error markers, acknowledgment timeouts)
//! - Run errors (state machine violations and operator cancellation)
//!
//! All error types use `thiserror` for ergonomic error handling.

use crate::data::Rect;
use thiserror::Error;

/// Configuration store error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter name outside the known set was used
    #[error("Unknown param: {name}")]
    UnknownField {
        /// The name that was looked up.
        name: String,
    },

    /// A value of the wrong kind was written to a field
    #[error("Param '{field}' expects a {expected} value")]
    TypeMismatch {
        /// The field that was written.
        field: String,
        /// Human readable kind of value the field holds.
        expected: &'static str,
    },

    /// A value that is well-typed but not acceptable for the field
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// The field that was written.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Geometry planner error type
///
/// Both variants are pre-flight: no command for the affected layer is sent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Scan parameters are out of their valid domain (L <= 0, S <= 0, W < 0, ...)
    #[error("Invalid parameter: {reason}")]
    InvalidParameter {
        /// Which parameter was rejected and why.
        reason: String,
    },

    /// The work rectangle is not contained in the safe rectangle
    #[error("Rectangle outside safe bounds. Rect: {work} | Safe: {safe}")]
    OutOfBounds {
        /// The derived work rectangle.
        work: Rect,
        /// The configured safe rectangle.
        safe: Rect,
    },
}

/// Transport protocol error type
///
/// Raised by the send/acknowledge exchange. Fatal to a run, never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// The firmware answered with an error marker
    #[error("Firmware error after '{command}': {message}")]
    FirmwareError {
        /// The command that was outstanding.
        command: String,
        /// The offending response line.
        message: String,
    },

    /// No acknowledgment arrived before the deadline
    #[error("Timeout waiting for ok after: {command} ({timeout_ms}ms){}", last_line_suffix(.last_line))]
    Timeout {
        /// The command that was outstanding.
        command: String,
        /// The deadline that elapsed, in milliseconds.
        timeout_ms: u64,
        /// The last non-empty line read before the deadline.
        last_line: Option<String>,
    },

    /// The underlying channel was closed by the peer
    #[error("Channel closed")]
    ChannelClosed,

    /// The underlying channel failed
    #[error("Channel I/O failure: {reason}")]
    Io {
        /// The I/O failure description.
        reason: String,
    },
}

fn last_line_suffix(last_line: &Option<String>) -> String {
    match last_line {
        Some(line) => format!(" (last: {})", line),
        None => String::new(),
    }
}

/// Run control error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    /// No transport is attached
    #[error("No connection to the printer")]
    NotConnected,

    /// A run is active (or a failed run was not acknowledged yet)
    #[error("Drawing already running")]
    AlreadyRunning,

    /// The operator requested a stop
    #[error("Stopped")]
    Cancelled,

    /// A transition the run state machine does not allow
    #[error("Invalid run state transition from {current} to {requested}")]
    InvalidStateTransition {
        /// The state the controller was in.
        current: String,
        /// The state that was requested.
        requested: String,
    },
}

/// Main error type for FiberKit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Geometry error
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Run control error
    #[error(transparent)]
    Run(#[from] RunError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Shorthand for [`GeometryError::InvalidParameter`]
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Error::Geometry(GeometryError::InvalidParameter {
            reason: reason.into(),
        })
    }

    /// Check if this is an acknowledgment timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Protocol(ProtocolError::Timeout { .. }))
    }

    /// Check if this is an operator cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Run(RunError::Cancelled))
    }

    /// Check if this error was raised before anything reached the transport
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Error::Geometry(_)
                | Error::Config(_)
                | Error::Run(RunError::NotConnected)
                | Error::Run(RunError::AlreadyRunning)
        )
    }

    /// Check if this error terminates a run as a failure
    pub fn is_fatal_to_run(&self) -> bool {
        !self.is_cancelled()
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_includes_last_line() {
        let err = ProtocolError::Timeout {
            command: "G28".to_string(),
            timeout_ms: 5000,
            last_line: Some("busy: processing".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("G28"));
        assert!(msg.contains("(last: busy: processing)"));
    }

    #[test]
    fn test_timeout_message_without_last_line() {
        let err = ProtocolError::Timeout {
            command: "M400".to_string(),
            timeout_ms: 30000,
            last_line: None,
        };
        assert!(!err.to_string().contains("last:"));
    }

    #[test]
    fn test_classification_helpers() {
        let cancelled: Error = RunError::Cancelled.into();
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_fatal_to_run());

        let oob: Error = GeometryError::OutOfBounds {
            work: Rect::new(0.0, 200.0, 20.0, 60.0),
            safe: Rect::new(0.0, 170.0, 20.0, 250.0),
        }
        .into();
        assert!(oob.is_preflight());
        assert!(oob.is_fatal_to_run());

        let fw: Error = ProtocolError::FirmwareError {
            command: "G1 X0".to_string(),
            message: "Error: unknown command".to_string(),
        }
        .into();
        assert!(!fw.is_preflight());
        assert!(!fw.is_timeout());
    }

    #[test]
    fn test_out_of_bounds_reports_both_rectangles() {
        let err = GeometryError::OutOfBounds {
            work: Rect::new(0.0, 200.0, 20.0, 60.0),
            safe: Rect::new(0.0, 170.0, 20.0, 250.0),
        };
        let msg = err.to_string();
        assert!(msg.contains("X[0.00,200.00] Y[20.00,60.00]"));
        assert!(msg.contains("X[0.00,170.00] Y[20.00,250.00]"));
    }
}
