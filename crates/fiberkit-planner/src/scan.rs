//! Scan lines and the post-line clean move.

use fiberkit_core::{Axis, Point2, Rect};
use serde::{Deserialize, Serialize};

/// Distance past the line end for the first clean move, in mm.
pub const CLEAN_NEAR: f64 = 5.0;
/// Distance past the line end for the second clean move, in mm.
pub const CLEAN_FAR: f64 = 10.0;

/// One deposition line
///
/// The nozzle travels along `scan_axis` from `from` to `to` while the other
/// axis is held at `coord`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanLine {
    /// Position in the layer, zero based
    pub index: usize,
    /// Axis of travel
    pub scan_axis: Axis,
    /// Fixed coordinate on the other axis
    pub coord: f64,
    /// Travel start along the scan axis
    pub from: f64,
    /// Travel end along the scan axis
    pub to: f64,
}

impl ScanLine {
    /// Build the line `index` spanning `[lo, hi]`, reversed on odd indices
    pub fn serpentine(index: usize, scan_axis: Axis, coord: f64, lo: f64, hi: f64) -> Self {
        let (from, to) = if index % 2 == 0 { (lo, hi) } else { (hi, lo) };
        Self {
            index,
            scan_axis,
            coord,
            from,
            to,
        }
    }

    /// True when travelling towards the far edge
    pub fn is_forward(&self) -> bool {
        self.to >= self.from
    }

    /// Start point on the bed
    pub fn start(&self) -> Point2 {
        self.point(self.from)
    }

    /// End point on the bed
    pub fn end(&self) -> Point2 {
        self.point(self.to)
    }

    fn point(&self, along: f64) -> Point2 {
        match self.scan_axis {
            Axis::X => Point2::new(along, self.coord),
            Axis::Y => Point2::new(self.coord, along),
        }
    }
}

/// Two-step wipe past a line end
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanPath {
    /// Axis the wipe runs along
    pub axis: Axis,
    /// First target (nozzle lowered to Z0)
    pub near: f64,
    /// Second target
    pub far: f64,
}

/// Wipe targets for `line`, continuing away from the work rectangle centre.
///
/// A line ending at or past the midpoint of the scan axis wipes towards +,
/// otherwise towards -. Both targets are clamped into `safe`.
pub fn clean_path(line: &ScanLine, work: &Rect, safe: &Rect) -> CleanPath {
    let axis = line.scan_axis;
    let end = line.to;
    let sign = if end >= work.mid(axis) { 1.0 } else { -1.0 };
    CleanPath {
        axis,
        near: safe.clamp(axis, end + sign * CLEAN_NEAR),
        far: safe.clamp(axis, end + sign * CLEAN_FAR),
    }
}
