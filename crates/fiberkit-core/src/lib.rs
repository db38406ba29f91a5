//! # FiberKit Core
//!
//! Core types shared by the FiberKit crates: the live configuration store,
//! geometry value types, the run-state controller, the error taxonomy and
//! the event bus.

pub mod data;
pub mod error;
pub mod event_bus;
pub mod run;

pub use data::{
    Axis, ConfigStore, Configuration, Cups, FiberOrientation, Mode, Orientation, ParamId,
    ParamValue, Point2, Preset, Rect,
};

pub use error::{ConfigError, Error, GeometryError, ProtocolError, Result, RunError};

// Re-export event bus for convenience
pub use event_bus::{
    event_bus, AppEvent, EventBus, EventCategory, EventFilter, LoggedEvent, SubscriptionId,
};

pub use run::{RunControl, RunOutcome, RunState};
