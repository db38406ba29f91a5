//! Mode dispatch over the two planners.

use fiberkit_core::{GeometryError, Mode, Rect};
use serde::Serialize;

use crate::anchored::{self, AnchoredParams};
use crate::legacy;
use crate::scan::ScanLine;
use crate::source::ParamSource;

/// One group of lines sharing a work rectangle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sweep {
    /// Area the lines cover
    pub work: Rect,
    /// Lines in execution order
    pub lines: Vec<ScanLine>,
}

/// Everything a layer will draw, for a frozen parameter set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerPlan {
    /// Zero-based layer index
    pub layer: u32,
    /// Sweeps in execution order
    pub sweeps: Vec<Sweep>,
}

impl LayerPlan {
    /// Total number of lines in the layer
    pub fn line_count(&self) -> usize {
        self.sweeps.iter().map(|s| s.lines.len()).sum()
    }
}

/// Plan layer `layer` of `mode` from the current parameters.
///
/// Anchored layers are identical for every layer index. Live runs do not
/// use this: they re-read the anchored parameters before every line.
pub fn plan_layer<S: ParamSource + ?Sized>(
    source: &S,
    mode: Mode,
    layer: u32,
) -> Result<LayerPlan, GeometryError> {
    let safe = source.safe_rect();
    let sweeps = match mode {
        Mode::CustomCentered => {
            let params = AnchoredParams::read(source);
            let work = anchored::validate(&params, &safe)?;
            vec![Sweep {
                work,
                lines: params.scan_lines(),
            }]
        }
        Mode::Legacy => legacy::plan_layer(
            layer,
            source.orientation(),
            source.cups(),
            source.step(),
            &safe,
        )?
        .into_iter()
        .map(|sweep| Sweep {
            work: sweep.work,
            lines: sweep.lines,
        })
        .collect(),
    };
    Ok(LayerPlan { layer, sweeps })
}

/// Validated anchored work rectangle for the current parameters
pub fn draw_rectangle<S: ParamSource + ?Sized>(source: &S) -> Result<Rect, GeometryError> {
    anchored::validate(&AnchoredParams::read(source), &source.safe_rect())
}

/// Whether the current anchored geometry passes validation
pub fn draw_rectangle_is_valid<S: ParamSource + ?Sized>(source: &S) -> bool {
    draw_rectangle(source).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiberkit_core::{Configuration, Orientation, Preset};

    #[test]
    fn test_anchored_plan_matches_reference_bench() {
        let config = Configuration::default();
        let plan = plan_layer(&config, Mode::CustomCentered, 0).unwrap();
        assert_eq!(plan.sweeps.len(), 1);
        assert_eq!(plan.line_count(), 41);
        assert_eq!(plan.sweeps[0].work, Rect::new(0.0, 80.0, 40.0, 80.0));
    }

    #[test]
    fn test_legacy_plan_uses_orientation() {
        let mut config = Configuration::from_preset(Preset::LegacyBench);
        config.step = 5.0;
        config.orientation = Orientation::Both;
        let plan = plan_layer(&config, Mode::Legacy, 0).unwrap();
        assert_eq!(plan.sweeps.len(), 2);
    }

    #[test]
    fn test_draw_rectangle_validity() {
        let mut config = Configuration::default();
        assert!(draw_rectangle_is_valid(&config));
        config.fiber_length = 200.0;
        assert!(!draw_rectangle_is_valid(&config));
    }
}
