//! Run state enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single deposition run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum RunState {
    /// No run in flight; a new run may start
    #[default]
    Idle = 0,
    /// The executor is dispatching commands
    Running = 1,
    /// The executor is parked at its next checkpoint
    Paused = 2,
    /// Stop requested; the executor unwinds at its next checkpoint
    Stopping = 3,
    /// All commands acknowledged (transient, settles to Idle)
    Finished = 4,
    /// A command failed; requires acknowledgment before the next run
    Failed = 5,
}

impl RunState {
    /// Decode the atomic representation
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => RunState::Running,
            2 => RunState::Paused,
            3 => RunState::Stopping,
            4 => RunState::Finished,
            5 => RunState::Failed,
            _ => RunState::Idle,
        }
    }

    /// True while a run owns the executor
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::Running | RunState::Paused | RunState::Stopping
        )
    }

    /// Check if a transition from this state to `target` is valid.
    ///
    /// Returns `true` for valid transitions:
    /// - Idle → Running
    /// - Running → Paused, Stopping, Finished, Failed
    /// - Paused → Running, Stopping, Failed
    /// - Stopping → Idle, or Failed when the in-flight command errored
    /// - Finished → Idle
    /// - Failed → Idle
    pub fn can_transition_to(&self, target: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, target),
            (Idle, Running)
                | (Running, Paused | Stopping | Finished | Failed)
                | (Paused, Running | Stopping | Failed)
                | (Stopping, Idle | Failed)
                | (Finished, Idle)
                | (Failed, Idle)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "Idle",
            RunState::Running => "Running",
            RunState::Paused => "Paused",
            RunState::Stopping => "Stopping",
            RunState::Finished => "Finished",
            RunState::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_u8() {
        for state in [
            RunState::Idle,
            RunState::Running,
            RunState::Paused,
            RunState::Stopping,
            RunState::Finished,
            RunState::Failed,
        ] {
            assert_eq!(RunState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn test_transitions() {
        assert!(RunState::Idle.can_transition_to(RunState::Running));
        assert!(RunState::Paused.can_transition_to(RunState::Stopping));
        assert!(RunState::Stopping.can_transition_to(RunState::Idle));
        assert!(RunState::Stopping.can_transition_to(RunState::Failed));
        assert!(!RunState::Stopping.can_transition_to(RunState::Finished));
        assert!(!RunState::Failed.can_transition_to(RunState::Running));
        assert!(!RunState::Idle.can_transition_to(RunState::Paused));
        assert!(!RunState::Stopping.can_transition_to(RunState::Running));
    }

    #[test]
    fn test_is_active() {
        assert!(RunState::Paused.is_active());
        assert!(!RunState::Failed.is_active());
        assert!(!RunState::Idle.is_active());
    }
}
