//! Cup-indexed scan (Legacy mode).
//!
//! The legacy fixture has fixed calibration anchors and a per-fixture far
//! limit. Every layer shifts the anchors by [`LAYER_CLEARANCE`]. A sweep
//! lays serpentine lines from the anchor towards the limit, the cross
//! coordinate advancing by `step` after each.
//!
//! The far limit is what ends a sweep. The event ceiling of two per
//! logical line ([`logical_line_count`]) is kept as a guard, but the cross
//! span of every fixture is at most [`SWEEP_SPAN`], so for any positive
//! step the limit truncates first (826 lines at step 0.1 against a ceiling
//! of 3300).

use fiberkit_core::{Axis, Cups, GeometryError, Orientation, Rect};

use crate::anchored::EDGE_EPSILON;
use crate::scan::ScanLine;

/// Anchor shift per layer, in mm.
pub const LAYER_CLEARANCE: f64 = 3.0;

/// Nominal sweep length used for the logical line count, in mm.
pub const SWEEP_SPAN: f64 = 82.5;

/// Bed calibration anchor for one sweep direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Anchor X, mm
    pub x: f64,
    /// Anchor Y, mm
    pub y: f64,
}

/// Anchor used by horizontal sweeps.
pub const HORIZONTAL_ANCHOR: Calibration = Calibration { x: 34.5, y: 89.5 };

/// Anchor used by vertical sweeps.
pub const VERTICAL_ANCHOR: Calibration = Calibration { x: 35.0, y: 90.0 };

/// Far (limit_x, limit_y) corner for a fixture
pub fn cup_limits(cups: Cups) -> (f64, f64) {
    match cups {
        Cups::Nine => (117.0, 172.0),
        Cups::Six => (91.0, 145.0),
        Cups::Three => (63.0, 117.0),
    }
}

/// Logical lines per sweep: `round(82.5 / (step / 2))`. A sweep never
/// emits more than twice this many lines.
pub fn logical_line_count(step: f64) -> usize {
    (SWEEP_SPAN / (step / 2.0)).round() as usize
}

/// Direction of one legacy sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDirection {
    /// Lines run along X and advance along Y
    Horizontal,
    /// Lines run along Y and advance along X
    Vertical,
}

impl SweepDirection {
    /// Sweeps performed for an orientation, in execution order
    pub fn for_orientation(orientation: Orientation) -> &'static [SweepDirection] {
        match orientation {
            Orientation::Horizontal => &[SweepDirection::Horizontal],
            Orientation::Vertical => &[SweepDirection::Vertical],
            Orientation::Both => &[SweepDirection::Horizontal, SweepDirection::Vertical],
        }
    }

    fn scan_axis(self) -> Axis {
        match self {
            SweepDirection::Horizontal => Axis::X,
            SweepDirection::Vertical => Axis::Y,
        }
    }

    fn anchor(self) -> Calibration {
        match self {
            SweepDirection::Horizontal => HORIZONTAL_ANCHOR,
            SweepDirection::Vertical => VERTICAL_ANCHOR,
        }
    }
}

/// One validated legacy sweep
#[derive(Debug, Clone, PartialEq)]
pub struct LegacySweep {
    /// Direction of the sweep
    pub direction: SweepDirection,
    /// Area covered by the sweep
    pub work: Rect,
    /// Lines in execution order
    pub lines: Vec<ScanLine>,
}

/// Plan one sweep of layer `layer` and check it against `safe`.
pub fn plan_sweep(
    direction: SweepDirection,
    layer: u32,
    cups: Cups,
    step: f64,
    safe: &Rect,
) -> Result<LegacySweep, GeometryError> {
    if step.is_nan() || step <= 0.0 {
        return Err(GeometryError::InvalidParameter {
            reason: format!("step must be > 0 (got {})", step),
        });
    }

    let offset = layer as f64 * LAYER_CLEARANCE;
    let anchor = direction.anchor();
    let (limit_x, limit_y) = cup_limits(cups);
    let work = Rect::new(anchor.x + offset, limit_x, anchor.y + offset, limit_y);

    if work.x0 >= work.x1 || work.y0 >= work.y1 {
        return Err(GeometryError::InvalidParameter {
            reason: format!(
                "layer {} offset moves the anchor past the {}-cup limits",
                layer + 1,
                cups
            ),
        });
    }
    if !safe.contains(&work) {
        tracing::warn!("Rectangle outside safe bounds. Rect: {} | Safe: {}", work, safe);
        return Err(GeometryError::OutOfBounds { work, safe: *safe });
    }

    let scan_axis = direction.scan_axis();
    let cross_axis = scan_axis.other();
    let lo = work.min(scan_axis);
    let hi = work.max(scan_axis);

    let events = logical_line_count(step) * 2;
    let mut lines = Vec::new();
    let mut coord = work.min(cross_axis);
    for index in 0..events {
        if coord > work.max(cross_axis) + EDGE_EPSILON {
            break;
        }
        lines.push(ScanLine::serpentine(index, scan_axis, coord, lo, hi));
        coord += step;
    }

    Ok(LegacySweep {
        direction,
        work,
        lines,
    })
}

/// Plan every sweep of a layer. `Both` yields a full horizontal sweep
/// followed by a full vertical sweep.
pub fn plan_layer(
    layer: u32,
    orientation: Orientation,
    cups: Cups,
    step: f64,
    safe: &Rect,
) -> Result<Vec<LegacySweep>, GeometryError> {
    SweepDirection::for_orientation(orientation)
        .iter()
        .map(|direction| plan_sweep(*direction, layer, cups, step, safe))
        .collect()
}
