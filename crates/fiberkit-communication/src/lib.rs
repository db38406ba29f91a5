//! # FiberKit Communication
//!
//! Serial line transport, the Marlin acknowledgment protocol, command
//! sequencing for deposition runs and the machine controller that ties
//! them to the run-state gate.

pub mod communication;
pub mod controller;
pub mod firmware;
pub mod sequencer;

pub use communication::{
    list_ports, Clock, LineChannel, ManualClock, ScriptedChannel, SerialLineChannel,
    SerialPortInfo, SystemClock,
};
pub use controller::{ControllerSettings, MachineController, SYRINGE_MARKS};
pub use firmware::marlin::{
    FilamentState, MachineCommand, MarlinResponse, MarlinResponseParser, ProtocolHandler,
};
pub use sequencer::{preflight, render_program, CommandSink, RecordingSink, Sequencer};
