//! Marlin firmware support
//!
//! Command vocabulary, response classification and the acknowledged
//! exchange used by every run and maintenance routine.

pub mod commands;
pub mod protocol;
pub mod response_parser;

pub use commands::{Expect, MachineCommand};
pub use protocol::{
    ProtocolHandler, DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, SENSOR_QUERY_WINDOW,
};
pub use response_parser::{FilamentState, MarlinResponse, MarlinResponseParser};
