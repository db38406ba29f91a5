//! Event bus shared by the run executor and its observers.
//!
//! Three delivery paths:
//! - synchronous handlers, called on the publishing thread
//! - a broadcast receiver for consumers that follow a run from another thread
//! - an optional bounded run log, exported after the run

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{AppEvent, EventCategory};

/// Capacity of the broadcast channel; slower receivers see `Lagged`
pub const BROADCAST_CAPACITY: usize = 1024;

/// Run log size of the process-wide bus
pub const DEFAULT_RUN_LOG_SIZE: usize = 10_000;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Which events a handler wants
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    /// Everything.
    #[default]
    All,
    /// Only events in these categories.
    Categories(Vec<EventCategory>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &AppEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
        }
    }
}

/// One entry of the run log
#[derive(Debug, Clone, Serialize)]
pub struct LoggedEvent {
    /// Wall-clock time of publication.
    pub at: DateTime<Utc>,
    /// The event.
    pub event: AppEvent,
}

struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    handler: Box<dyn Fn(&AppEvent) + Send + Sync>,
}

/// Publish/subscribe hub for connection, run, command, config and syringe events
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
    subscriptions: RwLock<Vec<Subscription>>,
    run_log: Option<Mutex<VecDeque<LoggedEvent>>>,
    run_log_size: usize,
}

impl EventBus {
    /// Bus without a run log
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            sender,
            subscriptions: RwLock::new(Vec::new()),
            run_log: None,
            run_log_size: 0,
        }
    }

    /// Bus that keeps the newest `size` events
    pub fn with_run_log(size: usize) -> Self {
        Self {
            run_log: Some(Mutex::new(VecDeque::with_capacity(size.min(1024)))),
            run_log_size: size,
            ..Self::new()
        }
    }

    /// Deliver `event` to matching handlers, broadcast receivers and the run log
    ///
    /// Returns how many handlers and receivers saw it.
    pub fn publish(&self, event: AppEvent) -> usize {
        if let Some(log) = &self.run_log {
            let mut log = log.lock();
            if log.len() == self.run_log_size {
                log.pop_front();
            }
            if self.run_log_size > 0 {
                log.push_back(LoggedEvent {
                    at: Utc::now(),
                    event: event.clone(),
                });
            }
        }

        let mut reached = 0;
        for subscription in self.subscriptions.read().iter() {
            if subscription.filter.matches(&event) {
                (subscription.handler)(&event);
                reached += 1;
            }
        }

        // No receivers is not an error; the handlers may be the only audience
        reached + self.sender.send(event).unwrap_or(0)
    }

    /// Register a handler; it runs on the publishing thread (often the run
    /// executor) and must return quickly
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(&AppEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscriptions.write().push(Subscription {
            id,
            filter,
            handler: Box::new(handler),
        });
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Remove a handler; false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        before != subscriptions.len()
    }

    /// Receiver for following events from another thread or task
    ///
    /// Only events published after this call are delivered.
    pub fn receiver(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Events in the run log, oldest first (empty without a run log)
    pub fn history(&self) -> Vec<AppEvent> {
        self.run_log
            .as_ref()
            .map(|log| log.lock().iter().map(|e| e.event.clone()).collect())
            .unwrap_or_default()
    }

    /// Timestamped run log for export
    pub fn run_log(&self) -> Vec<LoggedEvent> {
        self.run_log
            .as_ref()
            .map(|log| log.lock().iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.read().len())
            .field("run_log_size", &self.run_log_size)
            .finish()
    }
}

static EVENT_BUS: OnceLock<Arc<EventBus>> = OnceLock::new();

/// Process-wide bus, with a run log of [`DEFAULT_RUN_LOG_SIZE`] events
pub fn event_bus() -> Arc<EventBus> {
    EVENT_BUS
        .get_or_init(|| Arc::new(EventBus::with_run_log(DEFAULT_RUN_LOG_SIZE)))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::events::{ConnectionEvent, RunEvent};
    use crate::run::RunState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn connected() -> AppEvent {
        AppEvent::Connection(ConnectionEvent::Connected {
            port: "/dev/ttyUSB0".to_string(),
        })
    }

    #[test]
    fn test_unsubscribed_handler_stops_receiving() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let id = bus.subscribe(EventFilter::All, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(connected()), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.publish(connected()), 0);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handlers_see_only_their_categories() {
        let bus = EventBus::new();
        let connection_count = Arc::new(AtomicUsize::new(0));
        let run_count = Arc::new(AtomicUsize::new(0));

        let cc = connection_count.clone();
        bus.subscribe(
            EventFilter::Categories(vec![EventCategory::Connection]),
            move |_| {
                cc.fetch_add(1, Ordering::SeqCst);
            },
        );
        let rc = run_count.clone();
        bus.subscribe(
            EventFilter::Categories(vec![EventCategory::Run]),
            move |_| {
                rc.fetch_add(1, Ordering::SeqCst);
            },
        );

        bus.publish(connected());
        bus.publish(AppEvent::Run(RunEvent::StateChanged {
            from: RunState::Idle,
            to: RunState::Running,
        }));
        bus.publish(AppEvent::Run(RunEvent::Cancelled));

        assert_eq!(connection_count.load(Ordering::SeqCst), 1);
        assert_eq!(run_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_run_log_keeps_the_newest_events() {
        let bus = EventBus::with_run_log(5);
        for i in 0..10 {
            bus.publish(AppEvent::info(format!("line {}", i)));
        }

        let lines: Vec<String> = bus.history().iter().map(AppEvent::description).collect();
        assert_eq!(lines, ["line 5", "line 6", "line 7", "line 8", "line 9"]);
        assert_eq!(bus.run_log().len(), 5);
    }

    #[test]
    fn test_plain_bus_keeps_no_log() {
        let bus = EventBus::new();
        bus.publish(connected());
        assert!(bus.history().is_empty());
        assert!(bus.run_log().is_empty());
    }

    #[tokio::test]
    async fn test_receiver_follows_published_events() {
        let bus = EventBus::new();
        let mut receiver = bus.receiver();

        assert_eq!(bus.publish(connected()), 1);

        match receiver.recv().await {
            Ok(AppEvent::Connection(ConnectionEvent::Connected { port })) => {
                assert_eq!(port, "/dev/ttyUSB0");
            }
            other => panic!("Wrong event received: {:?}", other),
        }
    }
}
