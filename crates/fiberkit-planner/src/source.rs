//! Read access to the geometry parameters.
//!
//! The planner works on both a frozen [`Configuration`] (preview, tests) and
//! the live [`ConfigStore`] (runs, where every line re-reads its inputs).

use fiberkit_core::{ConfigStore, Configuration, Cups, FiberOrientation, Mode, Orientation, Rect};

/// Geometry parameters the planner consumes
pub trait ParamSource {
    /// Geometry strategy
    fn mode(&self) -> Mode;
    /// Legacy sweep orientation
    fn orientation(&self) -> Orientation;
    /// Legacy cup fixture
    fn cups(&self) -> Cups;
    /// Legacy scan step
    fn step(&self) -> f64;
    /// Hard physical boundary
    fn safe_rect(&self) -> Rect;
    /// Anchor X
    fn start_x(&self) -> f64;
    /// Anchor Y
    fn start_y(&self) -> f64;
    /// Fiber direction
    fn fiber_orientation(&self) -> FiberOrientation;
    /// Fiber length L
    fn fiber_length(&self) -> f64;
    /// Field width W
    fn fiber_width(&self) -> f64;
    /// Line spacing S
    fn fiber_spacing(&self) -> f64;
}

impl ParamSource for Configuration {
    fn mode(&self) -> Mode {
        self.mode
    }
    fn orientation(&self) -> Orientation {
        self.orientation
    }
    fn cups(&self) -> Cups {
        self.cups
    }
    fn step(&self) -> f64 {
        self.step
    }
    fn safe_rect(&self) -> Rect {
        Configuration::safe_rect(self)
    }
    fn start_x(&self) -> f64 {
        self.start_x
    }
    fn start_y(&self) -> f64 {
        self.start_y
    }
    fn fiber_orientation(&self) -> FiberOrientation {
        self.fiber_orientation
    }
    fn fiber_length(&self) -> f64 {
        self.fiber_length
    }
    fn fiber_width(&self) -> f64 {
        self.fiber_width
    }
    fn fiber_spacing(&self) -> f64 {
        self.fiber_spacing
    }
}

// Each call is an independent relaxed load; a multi-field read may mix old
// and new values while the operator is editing.
impl ParamSource for ConfigStore {
    fn mode(&self) -> Mode {
        ConfigStore::mode(self)
    }
    fn orientation(&self) -> Orientation {
        ConfigStore::orientation(self)
    }
    fn cups(&self) -> Cups {
        ConfigStore::cups(self)
    }
    fn step(&self) -> f64 {
        ConfigStore::step(self)
    }
    fn safe_rect(&self) -> Rect {
        ConfigStore::safe_rect(self)
    }
    fn start_x(&self) -> f64 {
        ConfigStore::start_x(self)
    }
    fn start_y(&self) -> f64 {
        ConfigStore::start_y(self)
    }
    fn fiber_orientation(&self) -> FiberOrientation {
        ConfigStore::fiber_orientation(self)
    }
    fn fiber_length(&self) -> f64 {
        ConfigStore::fiber_length(self)
    }
    fn fiber_width(&self) -> f64 {
        ConfigStore::fiber_width(self)
    }
    fn fiber_spacing(&self) -> f64 {
        ConfigStore::fiber_spacing(self)
    }
}
