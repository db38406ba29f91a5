//! Data models for FiberKit
//!
//! Provides the plain value types shared by the planner, the sequencer and
//! the persistence layer:
//! - Geometry primitives (`Point2`, `Rect`, `Axis`)
//! - Run parameters (`Configuration`) and its enumerations
//! - Default parameter presets

pub mod store;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use store::{ConfigStore, ParamId, ParamValue};

/// A point on the bed plane, in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point2 {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Coordinate along the given axis
    pub fn along(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }
}

/// Planar axis identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Left-right bed axis
    X,
    /// Front-back bed axis
    Y,
}

impl Axis {
    /// The perpendicular axis
    pub fn other(self) -> Self {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }

    /// G-code word letter for this axis
    pub fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
        }
    }
}

/// Axis-aligned rectangle on the bed (x0 <= x1, y0 <= y1)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x0: f64,
    /// Right edge
    pub x1: f64,
    /// Bottom edge
    pub y0: f64,
    /// Top edge
    pub y1: f64,
}

impl Rect {
    /// Create a rectangle from its edges
    pub fn new(x0: f64, x1: f64, y0: f64, y1: f64) -> Self {
        Self { x0, x1, y0, y1 }
    }

    /// Non-strict containment: every edge of `other` lies within `self`
    pub fn contains(&self, other: &Rect) -> bool {
        other.x0 >= self.x0 && other.x1 <= self.x1 && other.y0 >= self.y0 && other.y1 <= self.y1
    }

    /// Lower edge along an axis
    pub fn min(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x0,
            Axis::Y => self.y0,
        }
    }

    /// Upper edge along an axis
    pub fn max(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x1,
            Axis::Y => self.y1,
        }
    }

    /// Midpoint along an axis
    pub fn mid(&self, axis: Axis) -> f64 {
        (self.min(axis) + self.max(axis)) / 2.0
    }

    /// Extent along an axis
    pub fn span(&self, axis: Axis) -> f64 {
        self.max(axis) - self.min(axis)
    }

    /// Centre point
    pub fn center(&self) -> Point2 {
        Point2::new(self.mid(Axis::X), self.mid(Axis::Y))
    }

    /// Clamp a coordinate into the rectangle along an axis
    pub fn clamp(&self, axis: Axis, value: f64) -> f64 {
        value.max(self.min(axis)).min(self.max(axis))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X[{:.2},{:.2}] Y[{:.2},{:.2}]",
            self.x0, self.x1, self.y0, self.y1
        )
    }
}

/// Geometry strategy selected for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Cup-indexed scan with calibrated bed coordinates
    Legacy,
    /// Rectangle anchored at the configured start point
    CustomCentered,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Legacy => write!(f, "Legacy"),
            Mode::CustomCentered => write!(f, "CustomCentered"),
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Legacy" => Ok(Mode::Legacy),
            "CustomCentered" => Ok(Mode::CustomCentered),
            other => Err(ConfigError::InvalidValue {
                field: "mode".to_string(),
                reason: format!("unknown mode '{}'", other),
            }),
        }
    }
}

/// Sweep orientation for the legacy scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Lines run along X
    Horizontal,
    /// Lines run along Y
    Vertical,
    /// A full horizontal sweep followed by a full vertical sweep
    Both,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Horizontal => write!(f, "Horizontal"),
            Orientation::Vertical => write!(f, "Vertical"),
            Orientation::Both => write!(f, "Both"),
        }
    }
}

impl FromStr for Orientation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Horizontal" => Ok(Orientation::Horizontal),
            "Vertical" => Ok(Orientation::Vertical),
            "Both" => Ok(Orientation::Both),
            other => Err(ConfigError::InvalidValue {
                field: "orientation".to_string(),
                reason: format!("unknown orientation '{}'", other),
            }),
        }
    }
}

/// Fiber direction for the anchored rectangle scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FiberOrientation {
    /// Fiber length runs along X, width along Y
    Horizontal,
    /// Fiber length runs along Y, width along X
    Vertical,
}

impl FiberOrientation {
    /// Axis the fibers are drawn along
    pub fn length_axis(self) -> Axis {
        match self {
            FiberOrientation::Horizontal => Axis::X,
            FiberOrientation::Vertical => Axis::Y,
        }
    }
}

impl fmt::Display for FiberOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiberOrientation::Horizontal => write!(f, "Horizontal"),
            FiberOrientation::Vertical => write!(f, "Vertical"),
        }
    }
}

impl FromStr for FiberOrientation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Horizontal" => Ok(FiberOrientation::Horizontal),
            "Vertical" => Ok(FiberOrientation::Vertical),
            other => Err(ConfigError::InvalidValue {
                field: "fiber_orientation".to_string(),
                reason: format!("unknown fiber orientation '{}'", other),
            }),
        }
    }
}

/// Number of cups on the legacy bed fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Cups {
    /// Three-cup fixture
    Three,
    /// Six-cup fixture
    Six,
    /// Nine-cup fixture
    Nine,
}

impl Cups {
    /// Cup count as a number
    pub fn count(self) -> u8 {
        match self {
            Cups::Three => 3,
            Cups::Six => 6,
            Cups::Nine => 9,
        }
    }
}

impl TryFrom<u8> for Cups {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(Cups::Three),
            6 => Ok(Cups::Six),
            9 => Ok(Cups::Nine),
            other => Err(ConfigError::InvalidValue {
                field: "cups".to_string(),
                reason: format!("cups must be 3, 6 or 9, got {}", other),
            }),
        }
    }
}

impl From<Cups> for u8 {
    fn from(cups: Cups) -> Self {
        cups.count()
    }
}

impl fmt::Display for Cups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

/// Named default parameter sets
///
/// Two bench setups ship with different modes, safe areas and anchoring;
/// neither is implied, callers pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Anchored rectangle on the wide bench area
    #[default]
    AnchoredBench,
    /// Cup fixture with the legacy scan
    LegacyBench,
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preset::AnchoredBench => write!(f, "anchored_bench"),
            Preset::LegacyBench => write!(f, "legacy_bench"),
        }
    }
}

/// Complete set of tunable run parameters
///
/// This is the plain snapshot form; live runs read through [`ConfigStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Geometry strategy
    pub mode: Mode,

    /// Number of layers (>= 1)
    pub layers: u32,
    /// Legacy sweep orientation
    pub orientation: Orientation,
    /// Legacy cup fixture
    pub cups: Cups,

    /// Feed rate in mm/min
    pub speed: u32,
    /// Legacy scan step in mm
    pub step: f64,
    /// Extruder units retracted per deposition
    pub droplet_amount: f64,
    /// Lift height after a deposition, in mm
    pub z_hop: f64,
    /// Dwell after the lift, in ms (0 disables)
    pub pause_ms: u32,
    /// Deposition height, in mm
    pub z_offset: f64,
    /// Run the afterdrop sub-sequence at each line end
    pub afterdrop: bool,
    /// Run the nozzle clean move at each line end
    pub clean: bool,

    /// Syringe ledger, extruder units
    pub syringe_current_amount: f64,
    /// Units drawn by one intake
    pub syringe_droplet_units: u32,

    /// Safe area, left edge
    pub safe_x_min: f64,
    /// Safe area, right edge
    pub safe_x_max: f64,
    /// Safe area, bottom edge
    pub safe_y_min: f64,
    /// Safe area, top edge
    pub safe_y_max: f64,

    /// Anchor X (bottom-left corner of the work rectangle)
    pub start_x: f64,
    /// Anchor Y (bottom-left corner before the clearance offset)
    pub start_y: f64,

    /// Fiber direction
    pub fiber_orientation: FiberOrientation,
    /// Fiber length L in mm
    pub fiber_length: f64,
    /// Fiber field width W in mm
    pub fiber_width: f64,
    /// Distance S between fibers in mm
    pub fiber_spacing: f64,
}

impl Configuration {
    /// Build the parameter set for a preset
    pub fn from_preset(preset: Preset) -> Self {
        let anchored = Self {
            mode: Mode::CustomCentered,
            layers: 1,
            orientation: Orientation::Horizontal,
            cups: Cups::Nine,
            speed: 1500,
            step: 0.1,
            droplet_amount: 1.0,
            z_hop: 10.0,
            pause_ms: 0,
            z_offset: 0.4,
            afterdrop: true,
            clean: true,
            syringe_current_amount: 0.0,
            syringe_droplet_units: 5,
            safe_x_min: 0.0,
            safe_x_max: 170.0,
            safe_y_min: 20.0,
            safe_y_max: 250.0,
            start_x: 0.0,
            start_y: 0.0,
            fiber_orientation: FiberOrientation::Horizontal,
            fiber_length: 80.0,
            fiber_width: 40.0,
            fiber_spacing: 1.0,
        };

        match preset {
            Preset::AnchoredBench => anchored,
            Preset::LegacyBench => Self {
                mode: Mode::Legacy,
                safe_x_min: 10.0,
                safe_x_max: 160.0,
                safe_y_min: 60.0,
                safe_y_max: 200.0,
                ..anchored
            },
        }
    }

    /// Safe rectangle
    pub fn safe_rect(&self) -> Rect {
        Rect::new(
            self.safe_x_min,
            self.safe_x_max,
            self.safe_y_min,
            self.safe_y_max,
        )
    }

    /// Check the per-field invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "layers".to_string(),
                reason: "layers must be >= 1".to_string(),
            });
        }
        if self.safe_x_min >= self.safe_x_max || self.safe_y_min >= self.safe_y_max {
            return Err(ConfigError::InvalidValue {
                field: "safe bounds".to_string(),
                reason: format!("degenerate safe rectangle {}", self.safe_rect()),
            });
        }
        Ok(())
    }

    /// Serialize as pretty JSON for logs and exports
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::from_preset(Preset::default())
    }
}
