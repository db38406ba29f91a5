//! Scripted in-memory channel for tests and dry runs.
//!
//! Responses are queued with a due time on a [`ManualClock`]. A read that
//! finds nothing due advances the clock by the read timeout (or to the next
//! due response), which lets deadline logic run without wall-clock waits.

use super::{Clock, LineChannel, ManualClock};
use fiberkit_core::{Error, ProtocolError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

type WriteHook = Box<dyn FnMut(&str, usize) + Send>;
type ReplyFn = Box<dyn FnMut() -> Vec<String> + Send>;

enum Replies {
    Fixed(Vec<String>),
    Generated(ReplyFn),
}

/// Reply for written lines starting with a prefix
struct Responder {
    prefix: String,
    replies: Replies,
}

/// In-memory [`LineChannel`] with a scripted firmware side
pub struct ScriptedChannel {
    clock: Arc<ManualClock>,
    incoming: VecDeque<(Duration, String)>,
    written: Arc<Mutex<Vec<String>>>,
    auto_ack: bool,
    responders: Vec<Responder>,
    on_write: Option<WriteHook>,
    closed: bool,
    clear_fails: bool,
}

impl ScriptedChannel {
    /// Create a silent channel on its own clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(ManualClock::new()))
    }

    /// Create a silent channel on a shared clock
    pub fn with_clock(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            incoming: VecDeque::new(),
            written: Arc::new(Mutex::new(Vec::new())),
            auto_ack: false,
            responders: Vec::new(),
            on_write: None,
            closed: false,
            clear_fails: false,
        }
    }

    /// Answer every written line with `ok` unless a responder matches
    pub fn auto_ack(mut self) -> Self {
        self.auto_ack = true;
        self
    }

    /// Reply to lines starting with `prefix` with `replies` instead of `ok`
    pub fn respond_to(mut self, prefix: impl Into<String>, replies: &[&str]) -> Self {
        self.responders.push(Responder {
            prefix: prefix.into(),
            replies: Replies::Fixed(replies.iter().map(|r| r.to_string()).collect()),
        });
        self
    }

    /// Reply to lines starting with `prefix` with whatever `replies` yields
    pub fn respond_to_with(
        mut self,
        prefix: impl Into<String>,
        replies: impl FnMut() -> Vec<String> + Send + 'static,
    ) -> Self {
        self.responders.push(Responder {
            prefix: prefix.into(),
            replies: Replies::Generated(Box::new(replies)),
        });
        self
    }

    /// Run `hook(line, count)` after each write; `count` is one based
    pub fn on_write(mut self, hook: impl FnMut(&str, usize) + Send + 'static) -> Self {
        self.on_write = Some(Box::new(hook));
        self
    }

    /// Make `clear_buffers` report an I/O error (nothing is discarded)
    pub fn fail_clear(mut self) -> Self {
        self.clear_fails = true;
        self
    }

    /// Queue `line` to become readable at `at` on the channel clock
    pub fn push_at(&mut self, at: Duration, line: impl Into<String>) {
        let line = line.into();
        let pos = self
            .incoming
            .iter()
            .position(|(due, _)| *due > at)
            .unwrap_or(self.incoming.len());
        self.incoming.insert(pos, (at, line));
    }

    /// Queue `line` to become readable now
    pub fn push_line(&mut self, line: impl Into<String>) {
        let now = self.clock.now();
        self.push_at(now, line);
    }

    /// Make further reads fail once the queue is empty
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Shared log of written lines
    pub fn written(&self) -> Arc<Mutex<Vec<String>>> {
        self.written.clone()
    }

    /// The channel clock
    pub fn clock(&self) -> Arc<ManualClock> {
        self.clock.clone()
    }
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LineChannel for ScriptedChannel {
    fn write_line(&mut self, line: &str) -> Result<()> {
        if self.closed {
            return Err(ProtocolError::ChannelClosed.into());
        }

        let count = {
            let mut written = self.written.lock();
            written.push(line.to_string());
            written.len()
        };

        let replies = self
            .responders
            .iter_mut()
            .find(|r| line.starts_with(&r.prefix))
            .map(|r| match &mut r.replies {
                Replies::Fixed(lines) => lines.clone(),
                Replies::Generated(generate) => generate(),
            });
        match replies {
            Some(replies) => replies.into_iter().for_each(|r| self.push_line(r)),
            None if self.auto_ack => self.push_line("ok"),
            None => {}
        }

        if let Some(hook) = self.on_write.as_mut() {
            hook(line, count);
        }
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        let now = self.clock.now();
        match self.incoming.front() {
            Some((due, _)) if *due <= now => Ok(self.incoming.pop_front().map(|(_, l)| l)),
            Some((due, _)) => {
                let due = *due;
                if due - now <= timeout {
                    self.clock.advance_to(due);
                    Ok(self.incoming.pop_front().map(|(_, l)| l))
                } else {
                    self.clock.advance(timeout);
                    Ok(None)
                }
            }
            None if self.closed => Err(ProtocolError::ChannelClosed.into()),
            None => {
                self.clock.advance(timeout);
                Ok(None)
            }
        }
    }

    fn clear_buffers(&mut self) -> Result<()> {
        if self.clear_fails {
            return Err(Error::Io(std::io::Error::other("input buffer could not be flushed")));
        }
        let now = self.clock.now();
        self.incoming.retain(|(due, _)| *due > now);
        Ok(())
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_ack_and_responders() {
        let mut channel = ScriptedChannel::new()
            .auto_ack()
            .respond_to("M119", &["filament: open", "ok"]);

        channel.write_line("G90").unwrap();
        assert_eq!(
            channel.read_line(Duration::from_millis(10)).unwrap(),
            Some("ok".to_string())
        );

        channel.write_line("M119").unwrap();
        assert_eq!(
            channel.read_line(Duration::from_millis(10)).unwrap(),
            Some("filament: open".to_string())
        );
        assert_eq!(
            channel.read_line(Duration::from_millis(10)).unwrap(),
            Some("ok".to_string())
        );
        assert_eq!(*channel.written().lock(), vec!["G90", "M119"]);
    }

    #[test]
    fn test_reads_advance_clock_to_due_lines() {
        let mut channel = ScriptedChannel::new();
        channel.push_at(Duration::from_secs(3), "busy");

        assert_eq!(channel.read_line(Duration::from_secs(1)).unwrap(), None);
        assert_eq!(channel.clock().now(), Duration::from_secs(1));

        assert_eq!(
            channel.read_line(Duration::from_secs(5)).unwrap(),
            Some("busy".to_string())
        );
        assert_eq!(channel.clock().now(), Duration::from_secs(3));
    }

    #[test]
    fn test_closed_channel_errors_when_drained() {
        let mut channel = ScriptedChannel::new();
        channel.push_line("ok");
        channel.close();
        assert!(channel.read_line(Duration::ZERO).unwrap().is_some());
        assert!(channel.read_line(Duration::ZERO).is_err());
        assert!(channel.write_line("G90").is_err());
    }
}
