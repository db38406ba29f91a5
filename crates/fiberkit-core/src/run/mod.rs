//! # Run Control
//!
//! The run-state machine shared by the operator surface and the executor:
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//! Running/Paused --stop--> Stopping --drain--> Idle
//! Running --failure--> Failed --acknowledge--> Idle
//! Running --success--> Finished --> Idle
//! ```

mod control;
mod state;

pub use control::{RunControl, RunOutcome, DEFAULT_PAUSE_POLL};
pub use state::RunState;
