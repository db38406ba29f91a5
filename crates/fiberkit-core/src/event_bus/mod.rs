//! # Event Bus Module
//!
//! Publish/subscribe channel between the run executor and its observers
//! (operator surface, log view, report export).
//!
//! ## Overview
//!
//! - Publishers emit typed events without knowing subscribers
//! - Subscribers filter by category and receive events of interest
//! - Async consumers can poll a broadcast receiver instead
//! - An optional bounded history keeps the run log for export
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fiberkit_core::event_bus::{event_bus, AppEvent, EventCategory, EventFilter, RunEvent};
//!
//! let subscription = event_bus().subscribe(
//!     EventFilter::Categories(vec![EventCategory::Run]),
//!     |event| {
//!         if let AppEvent::Run(RunEvent::StateChanged { from, to }) = event {
//!             println!("run {} -> {}", from, to);
//!         }
//!     },
//! );
//!
//! event_bus().unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
