//! Line-oriented transport.
//!
//! The protocol layer only needs to write one newline-terminated line and
//! to read one line with a bounded wait. [`LineChannel`] is that seam; the
//! serial implementation and the scripted test double both sit behind it.
//! A [`Clock`] supplies the time base for acknowledgment deadlines.

pub mod mock;
pub mod serial;

use fiberkit_core::Result;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

pub use mock::ScriptedChannel;
pub use serial::{list_ports, SerialLineChannel, SerialPortInfo};

/// Bidirectional newline-terminated ASCII channel
pub trait LineChannel: Send {
    /// Write `line` followed by a newline
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Read one line (without its terminator), waiting at most `timeout`.
    ///
    /// `Ok(None)` means nothing arrived in time.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>>;

    /// Drop anything buffered in either direction
    fn clear_buffers(&mut self) -> Result<()> {
        Ok(())
    }

    /// Human readable name (port path)
    fn name(&self) -> String;
}

impl<T: LineChannel + ?Sized> LineChannel for Box<T> {
    fn write_line(&mut self, line: &str) -> Result<()> {
        (**self).write_line(line)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        (**self).read_line(timeout)
    }

    fn clear_buffers(&mut self) -> Result<()> {
        (**self).clear_buffers()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// Monotonic time source for protocol deadlines
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Move the clock forward to `to` (never backwards)
    pub fn advance_to(&self, to: Duration) {
        let mut now = self.now.lock();
        if to > *now {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_only_moves_forward() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(2));
        clock.advance_to(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_secs(2));
        clock.advance_to(Duration::from_secs(5));
        assert_eq!(clock.now(), Duration::from_secs(5));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
