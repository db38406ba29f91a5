//! Destinations for sequenced commands.

use fiberkit_core::Result;

use crate::firmware::marlin::{MachineCommand, ProtocolHandler};

/// Where the sequencer hands each command
pub trait CommandSink {
    /// Deliver one command, returning once it may be followed by the next
    fn dispatch(&mut self, command: &MachineCommand) -> Result<()>;
}

impl CommandSink for ProtocolHandler {
    fn dispatch(&mut self, command: &MachineCommand) -> Result<()> {
        ProtocolHandler::dispatch(self, command)
    }
}

/// Sink that keeps every command, for previews and dry runs
#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: Vec<MachineCommand>,
}

impl RecordingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received so far
    pub fn commands(&self) -> &[MachineCommand] {
        &self.commands
    }

    /// Wire text of every command received
    pub fn into_lines(self) -> Vec<String> {
        self.commands
            .into_iter()
            .map(|c| c.text().to_string())
            .collect()
    }
}

impl CommandSink for RecordingSink {
    fn dispatch(&mut self, command: &MachineCommand) -> Result<()> {
        self.commands.push(command.clone());
        Ok(())
    }
}
