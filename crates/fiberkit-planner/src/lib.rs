//! # FiberKit Planner
//!
//! Geometry planning for deposition runs: the anchored work rectangle with
//! its serpentine scan lines, and the cup-indexed legacy scan. All functions
//! are pure; the sequencer decides when parameters are (re)read.

pub mod anchored;
pub mod legacy;
pub mod plan;
pub mod scan;
pub mod source;

pub use anchored::{AnchoredParams, ANCHOR_Y_CLEARANCE};
pub use plan::{draw_rectangle, draw_rectangle_is_valid, plan_layer, LayerPlan, Sweep};
pub use scan::{clean_path, CleanPath, ScanLine};
pub use source::ParamSource;
