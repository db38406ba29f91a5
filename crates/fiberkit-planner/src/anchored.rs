//! Anchored rectangle planning (CustomCentered mode).
//!
//! The anchor is measured from the bottom-left corner of the safe rectangle.
//! The work rectangle's own bottom-left corner sits at
//! `(origin_x + start_x, origin_y + start_y + ANCHOR_Y_CLEARANCE)`. Fibers
//! run along the length axis and are stacked `spacing` apart across the
//! width axis, alternating direction line by line.

use fiberkit_core::{FiberOrientation, GeometryError, Point2, Rect};

use crate::scan::ScanLine;
use crate::source::ParamSource;

/// Fixed Y clearance added to the anchor, in mm.
pub const ANCHOR_Y_CLEARANCE: f64 = 20.0;

/// Tolerance for a line sitting on the far edge of the rectangle.
pub const EDGE_EPSILON: f64 = 1e-6;

/// Absorbs float noise in `width / spacing` (0.3 / 0.1 is 2.999...).
const COUNT_EPSILON: f64 = 1e-9;

/// Parameters of one anchored rectangle, read in one pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchoredParams {
    /// Fiber direction
    pub orientation: FiberOrientation,
    /// Fiber length L
    pub length: f64,
    /// Field width W
    pub width: f64,
    /// Line spacing S
    pub spacing: f64,
    /// Anchor X
    pub start_x: f64,
    /// Anchor Y
    pub start_y: f64,
    /// Bottom-left corner of the safe rectangle the anchor is measured from
    pub origin: Point2,
}

impl AnchoredParams {
    /// Read the anchored-rectangle fields from `source`
    pub fn read<S: ParamSource + ?Sized>(source: &S) -> Self {
        Self {
            orientation: source.fiber_orientation(),
            length: source.fiber_length(),
            width: source.fiber_width(),
            spacing: source.fiber_spacing(),
            start_x: source.start_x(),
            start_y: source.start_y(),
            origin: {
                let safe = source.safe_rect();
                Point2::new(safe.x0, safe.y0)
            },
        }
    }

    /// Reject non-physical dimensions
    pub fn check(&self) -> Result<(), GeometryError> {
        if self.length.is_nan() || self.length <= 0.0 {
            return Err(GeometryError::InvalidParameter {
                reason: format!("fiber length must be > 0 (got {})", self.length),
            });
        }
        if self.spacing.is_nan() || self.spacing <= 0.0 {
            return Err(GeometryError::InvalidParameter {
                reason: format!("fiber spacing must be > 0 (got {})", self.spacing),
            });
        }
        if self.width.is_nan() || self.width < 0.0 {
            return Err(GeometryError::InvalidParameter {
                reason: format!("fiber width must be >= 0 (got {})", self.width),
            });
        }
        Ok(())
    }

    /// Derived work rectangle, without any bounds check
    pub fn work_rect(&self) -> Rect {
        let x0 = self.origin.x + self.start_x;
        let y0 = self.origin.y + self.start_y + ANCHOR_Y_CLEARANCE;
        match self.orientation {
            FiberOrientation::Horizontal => Rect::new(x0, x0 + self.length, y0, y0 + self.width),
            FiberOrientation::Vertical => Rect::new(x0, x0 + self.width, y0, y0 + self.length),
        }
    }

    /// Number of lines: one for a zero width, else `floor(W / S) + 1`
    pub fn line_count(&self) -> usize {
        if self.width == 0.0 {
            1
        } else {
            (self.width / self.spacing + COUNT_EPSILON).floor() as usize + 1
        }
    }

    /// Line `index` of the rectangle derived from these parameters.
    ///
    /// Returns `None` once the line would sit beyond the far edge of the
    /// width axis.
    pub fn scan_line(&self, index: usize) -> Option<ScanLine> {
        let rect = self.work_rect();
        let length_axis = self.orientation.length_axis();
        let width_axis = length_axis.other();

        let coord = rect.min(width_axis) + index as f64 * self.spacing;
        if coord > rect.max(width_axis) + EDGE_EPSILON {
            return None;
        }

        Some(ScanLine::serpentine(
            index,
            length_axis,
            coord,
            rect.min(length_axis),
            rect.max(length_axis),
        ))
    }

    /// All lines for a frozen parameter set
    pub fn scan_lines(&self) -> Vec<ScanLine> {
        (0..self.line_count())
            .map_while(|index| self.scan_line(index))
            .collect()
    }
}

/// Check the parameters and containment of the work rectangle in `safe`.
///
/// Returns the work rectangle on success.
pub fn validate(params: &AnchoredParams, safe: &Rect) -> Result<Rect, GeometryError> {
    params.check()?;
    let work = params.work_rect();
    if !safe.contains(&work) {
        tracing::warn!("Rectangle outside safe bounds. Rect: {} | Safe: {}", work, safe);
        return Err(GeometryError::OutOfBounds { work, safe: *safe });
    }
    Ok(work)
}
