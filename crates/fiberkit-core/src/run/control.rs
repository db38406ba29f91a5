//! Run-state controller and the dispatch checkpoint.
//!
//! `RunControl` is shared (behind an `Arc`) between the operator surface and
//! the single executor thread. The state word is the only value both sides
//! need ordered visibility on, so it lives in one `AtomicU8` and every
//! transition is a compare-and-swap.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::RunState;
use crate::error::RunError;
use crate::event_bus::{AppEvent, EventBus, RunEvent};

/// Default sleep between checks while paused.
pub const DEFAULT_PAUSE_POLL: Duration = Duration::from_millis(50);

/// Run-state owner and cooperative cancellation token
pub struct RunControl {
    state: AtomicU8,
    pause_poll: Duration,
    bus: Option<Arc<EventBus>>,
}

impl RunControl {
    /// Create an idle controller with the default pause poll interval
    pub fn new() -> Self {
        Self::with_pause_poll(DEFAULT_PAUSE_POLL)
    }

    /// Create an idle controller with a custom pause poll interval
    pub fn with_pause_poll(pause_poll: Duration) -> Self {
        Self {
            state: AtomicU8::new(RunState::Idle as u8),
            pause_poll,
            bus: None,
        }
    }

    /// Publish state transitions on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Current state
    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True while a run owns the executor
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// True while paused
    pub fn is_paused(&self) -> bool {
        self.state() == RunState::Paused
    }

    /// Compare-and-swap `from` → `to`, publishing the change on success
    pub fn transition(&self, from: RunState, to: RunState) -> Result<(), RunError> {
        if !from.can_transition_to(to) {
            return Err(RunError::InvalidStateTransition {
                current: from.to_string(),
                requested: to.to_string(),
            });
        }
        match self.state.compare_exchange(
            from as u8,
            to as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                tracing::info!("Run state {} -> {}", from, to);
                self.publish(RunEvent::StateChanged { from, to });
                Ok(())
            }
            Err(actual) => Err(RunError::InvalidStateTransition {
                current: RunState::from_u8(actual).to_string(),
                requested: to.to_string(),
            }),
        }
    }

    /// Claim the executor: Idle → Running
    ///
    /// Any other state (including an unacknowledged failure) is reported as
    /// `AlreadyRunning`.
    pub fn start(&self) -> Result<(), RunError> {
        self.transition(RunState::Idle, RunState::Running)
            .map_err(|_| RunError::AlreadyRunning)
    }

    /// Running → Paused. Returns false when there was nothing to pause.
    pub fn pause(&self) -> bool {
        self.transition(RunState::Running, RunState::Paused).is_ok()
    }

    /// Paused → Running. Returns false when there was nothing to resume.
    pub fn resume(&self) -> bool {
        self.transition(RunState::Paused, RunState::Running).is_ok()
    }

    /// Pause when running, resume when paused
    pub fn toggle_pause(&self) -> bool {
        self.pause() || self.resume()
    }

    /// Request cancellation of the active run.
    ///
    /// Returns false when no run was active (the call is then a no-op).
    pub fn stop(&self) -> bool {
        loop {
            let current = self.state();
            if !matches!(current, RunState::Running | RunState::Paused) {
                return false;
            }
            if self.transition(current, RunState::Stopping).is_ok() {
                return true;
            }
        }
    }

    /// Return `Cancelled` once stop has been requested, waiting out a pause.
    ///
    /// Called by the executor before every command it dispatches.
    pub fn checkpoint(&self) -> Result<(), RunError> {
        loop {
            match self.state() {
                RunState::Paused => std::thread::sleep(self.pause_poll),
                RunState::Running => return Ok(()),
                _ => return Err(RunError::Cancelled),
            }
        }
    }

    /// Close out the run after the executor returns.
    ///
    /// A cancelled run drains through Stopping to Idle. Success goes
    /// Running → Finished → Idle. A fatal error leaves the controller in
    /// Failed, even when a stop request arrived while the failing command
    /// was in flight.
    pub fn complete(&self, outcome: RunOutcome) -> RunState {
        loop {
            let current = self.state();
            let result = match (current, outcome) {
                (RunState::Stopping, RunOutcome::Failed) => {
                    self.transition(RunState::Stopping, RunState::Failed)
                }
                (RunState::Stopping, _) => self.transition(RunState::Stopping, RunState::Idle),
                (RunState::Running, RunOutcome::Succeeded) => self
                    .transition(RunState::Running, RunState::Finished)
                    .and_then(|_| self.transition(RunState::Finished, RunState::Idle)),
                (RunState::Running | RunState::Paused, RunOutcome::Failed) => {
                    self.transition(current, RunState::Failed)
                }
                (RunState::Running | RunState::Paused, RunOutcome::Cancelled) => self
                    .transition(current, RunState::Stopping)
                    .and_then(|_| self.transition(RunState::Stopping, RunState::Idle)),
                (RunState::Paused, RunOutcome::Succeeded) => {
                    // The last command acknowledged while a pause request was in flight.
                    self.transition(RunState::Paused, RunState::Running)
                        .and_then(|_| self.transition(RunState::Running, RunState::Finished))
                        .and_then(|_| self.transition(RunState::Finished, RunState::Idle))
                }
                _ => return current,
            };
            if result.is_ok() {
                return self.state();
            }
        }
    }

    /// Failed → Idle
    pub fn acknowledge_failure(&self) -> bool {
        self.transition(RunState::Failed, RunState::Idle).is_ok()
    }

    fn publish(&self, event: RunEvent) {
        if let Some(bus) = &self.bus {
            let _ = bus.publish(AppEvent::Run(event));
        }
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunControl")
            .field("state", &self.state())
            .field("pause_poll", &self.pause_poll)
            .finish()
    }
}

/// How the executor body ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every command was acknowledged.
    Succeeded,
    /// The executor unwound at a checkpoint after a stop request.
    Cancelled,
    /// A command failed (firmware error, timeout, closed channel).
    Failed,
}
