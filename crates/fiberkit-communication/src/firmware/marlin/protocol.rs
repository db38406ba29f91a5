//! Half-duplex send-and-await exchange with Marlin.
//!
//! Exactly one command is outstanding at a time: a command is written, then
//! response lines are read until it is acknowledged, rejected or the
//! deadline passes. Busy reports and idle polls never move the deadline.

use std::sync::Arc;
use std::time::Duration;

use fiberkit_core::event_bus::{AppEvent, CommandEvent, EventBus};
use fiberkit_core::{ProtocolError, Result};

use super::commands::{endstop_report, Expect, MachineCommand};
use super::response_parser::{FilamentState, MarlinResponse, MarlinResponseParser};
use crate::communication::{Clock, LineChannel, SystemClock};

/// Default acknowledgment deadline for run commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for the `G28` handshake after opening the port.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(120);

/// Window for a filament sensor report after `M119`.
pub const SENSOR_QUERY_WINDOW: Duration = Duration::from_secs(2);

/// Longest single blocking read while waiting.
const READ_SLICE: Duration = Duration::from_millis(100);

/// Owns the channel and performs acknowledged exchanges over it
pub struct ProtocolHandler {
    channel: Box<dyn LineChannel>,
    clock: Arc<dyn Clock>,
    parser: MarlinResponseParser,
    command_timeout: Duration,
    bus: Option<Arc<EventBus>>,
}

impl ProtocolHandler {
    /// Wrap `channel`, timing deadlines on the system clock
    pub fn new(channel: Box<dyn LineChannel>) -> Self {
        Self::with_clock(channel, Arc::new(SystemClock::new()))
    }

    /// Wrap `channel`, timing deadlines on `clock`
    pub fn with_clock(channel: Box<dyn LineChannel>, clock: Arc<dyn Clock>) -> Self {
        Self {
            channel,
            clock,
            parser: MarlinResponseParser::new(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            bus: None,
        }
    }

    /// Deadline used by [`dispatch`](Self::dispatch)
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Publish command traffic on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Name of the underlying channel
    pub fn channel_name(&self) -> String {
        self.channel.name()
    }

    /// Drop anything buffered on the channel
    pub fn clear_buffers(&mut self) -> Result<()> {
        self.channel.clear_buffers()
    }

    /// Send `command` honouring its response expectation
    pub fn dispatch(&mut self, command: &MachineCommand) -> Result<()> {
        match command.expect() {
            Expect::Ack => self.send_and_await(command.text(), self.command_timeout),
            Expect::Nothing => self.write(command.text()),
        }
    }

    /// Write `command` and block until it is acknowledged.
    ///
    /// Fails with `FirmwareError` on an error report and with `Timeout`
    /// (carrying the last non-empty line) when `timeout` elapses first.
    pub fn send_and_await(&mut self, command: &str, timeout: Duration) -> Result<()> {
        self.write(command)?;

        let started = self.clock.now();
        let deadline = started + timeout;
        let mut last_line: Option<String> = None;

        loop {
            let now = self.clock.now();
            if now >= deadline {
                tracing::error!("Timeout waiting for ok after: {}", command);
                return Err(ProtocolError::Timeout {
                    command: command.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                    last_line,
                }
                .into());
            }

            let wait = (deadline - now).min(READ_SLICE);
            let Some(line) = self.channel.read_line(wait)? else {
                continue;
            };
            let Some(response) = self.parser.parse_line(&line) else {
                continue;
            };
            last_line = Some(line.trim().to_string());

            match response {
                MarlinResponse::Ok => {
                    let elapsed = self.clock.now().saturating_sub(started);
                    tracing::trace!("ok {} ({:?})", command, elapsed);
                    self.publish(CommandEvent::Acknowledged {
                        command: command.to_string(),
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                    return Ok(());
                }
                MarlinResponse::Busy(text) => tracing::debug!("{}: {}", command, text),
                MarlinResponse::Error(message) => {
                    tracing::error!("Firmware error after '{}': {}", command, message);
                    return Err(ProtocolError::FirmwareError {
                        command: command.to_string(),
                        message,
                    }
                    .into());
                }
                MarlinResponse::Filament(_) | MarlinResponse::Raw(_) => {
                    tracing::trace!("<< {}", line);
                }
            }
        }
    }

    /// Ask for the filament sensor state.
    ///
    /// Waits up to [`SENSOR_QUERY_WINDOW`] for the sensor line and the
    /// trailing `ok`. Returns `None` when the sensor never reported.
    pub fn query_filament(&mut self) -> Result<Option<FilamentState>> {
        let command = endstop_report();
        self.write(command.text())?;

        let deadline = self.clock.now() + SENSOR_QUERY_WINDOW;
        let mut state = None;
        loop {
            let now = self.clock.now();
            if now >= deadline {
                return Ok(state);
            }
            let wait = (deadline - now).min(READ_SLICE);
            let Some(line) = self.channel.read_line(wait)? else {
                continue;
            };
            match self.parser.parse_line(&line) {
                Some(MarlinResponse::Filament(reported)) => state = Some(reported),
                Some(MarlinResponse::Ok) if state.is_some() => return Ok(state),
                _ => {}
            }
        }
    }

    fn write(&mut self, command: &str) -> Result<()> {
        tracing::debug!(">> {}", command);
        self.channel.write_line(command)?;
        self.publish(CommandEvent::Sent {
            command: command.to_string(),
        });
        Ok(())
    }

    fn publish(&self, event: CommandEvent) {
        if let Some(bus) = &self.bus {
            let _ = bus.publish(AppEvent::Command(event));
        }
    }
}

impl std::fmt::Debug for ProtocolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolHandler")
            .field("channel", &self.channel.name())
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}
