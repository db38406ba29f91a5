//! Marlin command vocabulary.
//!
//! Every literal the sequencer and the syringe maintenance routines send is
//! produced here, so the wire text stays in one place.

use fiberkit_core::{Axis, Point2};
use serde::Serialize;
use std::fmt;

/// What the sender waits for after writing a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
    /// Block until the firmware acknowledges
    Ack,
    /// Fire and forget
    Nothing,
}

/// One textual instruction plus its response expectation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineCommand {
    text: String,
    expect: Expect,
}

impl MachineCommand {
    /// A command that must be acknowledged
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expect: Expect::Ack,
        }
    }

    /// A command written without waiting for a reply
    pub fn unacknowledged(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expect: Expect::Nothing,
        }
    }

    /// Wire text, without terminator
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Response expectation
    pub fn expect(&self) -> Expect {
        self.expect
    }
}

impl fmt::Display for MachineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Feed rate for extruder moves, mm/min.
pub const EXTRUDE_FEED: u32 = 200;
/// Dwell after a deposition retract, ms.
pub const DEPOSIT_DWELL_MS: u32 = 1000;
/// Dwell after an afterdrop retract, ms.
pub const AFTERDROP_DWELL_MS: u32 = 500;
/// Lift before the first layer move, mm.
pub const LAYER_TRAVEL_Z: f64 = 7.0;
/// Lift after a clean wipe, mm.
pub const CLEAN_LIFT_Z: f64 = 3.0;

/// Extruder amounts use the shortest round-trip form with a trailing `.0`
/// on whole numbers (`1.0`, `0.25`).
pub fn format_amount(value: f64) -> String {
    format!("{:?}", value)
}

/// `M220 S100`
pub fn reset_speed_override() -> MachineCommand {
    MachineCommand::new("M220 S100")
}

/// `M221 S100`
pub fn reset_flow_override() -> MachineCommand {
    MachineCommand::new("M221 S100")
}

/// `M302 S0`: allow extrusion at any temperature
pub fn allow_cold_extrusion() -> MachineCommand {
    MachineCommand::new("M302 S0")
}

/// `G90`
pub fn absolute_positioning() -> MachineCommand {
    MachineCommand::new("G90")
}

/// `G91`
pub fn relative_positioning() -> MachineCommand {
    MachineCommand::new("G91")
}

/// `M82`
pub fn absolute_extrusion() -> MachineCommand {
    MachineCommand::new("M82")
}

/// `G92 E0`
pub fn zero_extruder() -> MachineCommand {
    MachineCommand::new("G92 E0")
}

/// `G28`
pub fn home_all() -> MachineCommand {
    MachineCommand::new("G28")
}

/// `M400`: wait for all queued moves
pub fn finish_moves() -> MachineCommand {
    MachineCommand::new("M400")
}

/// `G4 P{ms}`
pub fn dwell(ms: u32) -> MachineCommand {
    MachineCommand::new(format!("G4 P{}", ms))
}

/// `G1 X.. Y.. F..`
pub fn move_xy(point: Point2, feed: u32) -> MachineCommand {
    MachineCommand::new(format!("G1 X{:.3} Y{:.3} F{}", point.x, point.y, feed))
}

/// `G1 Z.. F..`
pub fn move_z(z: f64, feed: u32) -> MachineCommand {
    MachineCommand::new(format!("G1 Z{:.3} F{}", z, feed))
}

/// `G1 Z2 F1500`: safe travel height for the header
pub fn travel_height() -> MachineCommand {
    MachineCommand::new("G1 Z2 F1500")
}

/// `G1 Z7 F{speed}`: lift at the start of a layer
pub fn layer_lift(feed: u32) -> MachineCommand {
    MachineCommand::new(format!("G1 Z{} F{}", LAYER_TRAVEL_Z, feed))
}

/// `G1 E-{amount} F200` (relative mode is expected to be active)
pub fn retract(amount: f64) -> MachineCommand {
    MachineCommand::new(format!("G1 E-{} F{}", format_amount(amount), EXTRUDE_FEED))
}

/// `G1 F{speed}`: restore the feed rate
pub fn set_feed(feed: u32) -> MachineCommand {
    MachineCommand::new(format!("G1 F{}", feed))
}

/// `G1 {axis}.. Z0 F..`: first clean wipe, nozzle down
pub fn clean_wipe(axis: Axis, to: f64, feed: u32) -> MachineCommand {
    MachineCommand::new(format!("G1 {}{:.3} Z0 F{}", axis.letter(), to, feed))
}

/// `G1 {axis}.. F..`
pub fn move_axis(axis: Axis, to: f64, feed: u32) -> MachineCommand {
    MachineCommand::new(format!("G1 {}{:.3} F{}", axis.letter(), to, feed))
}

/// `G1 Z3 F{speed}`: lift after a clean wipe
pub fn clean_lift(feed: u32) -> MachineCommand {
    MachineCommand::new(format!("G1 Z{} F{}", CLEAN_LIFT_Z, feed))
}

/// `M300 S440 P200`: completion tone
pub fn tone() -> MachineCommand {
    MachineCommand::new("M300 S440 P200")
}

/// `G0 X10 Y190 Z30 F3000`: parking move
pub fn park() -> MachineCommand {
    MachineCommand::new("G0 X10 Y190 Z30 F3000")
}

/// `M119`: endstop and filament sensor report
pub fn endstop_report() -> MachineCommand {
    MachineCommand::new("M119")
}

/// `M302 P1`: disable the cold extrusion check
pub fn disable_cold_extrusion_check() -> MachineCommand {
    MachineCommand::new("M302 P1")
}

/// `M302`: report the cold extrusion state
pub fn cold_extrusion_report() -> MachineCommand {
    MachineCommand::new("M302")
}

/// `G91 E0`
pub fn relative_extruder_origin() -> MachineCommand {
    MachineCommand::new("G91 E0")
}

/// `G1 E-0.5 F300`: one plunger homing step
pub fn plunger_home_step() -> MachineCommand {
    MachineCommand::new("G1 E-0.5 F300")
}

/// `G1 E{pos} F200` without waiting for the reply
pub fn plunger_to(position: u32) -> MachineCommand {
    MachineCommand::unacknowledged(format!("G1 E{} F{}", position, EXTRUDE_FEED))
}

/// `M302 S0` without waiting for the reply
pub fn allow_cold_extrusion_unacknowledged() -> MachineCommand {
    MachineCommand::unacknowledged("M302 S0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_formatting() {
        assert_eq!(format_amount(1.0), "1.0");
        assert_eq!(format_amount(0.25), "0.25");
        assert_eq!(format_amount(12.0), "12.0");
    }

    #[test]
    fn test_motion_literals() {
        assert_eq!(
            move_xy(Point2::new(0.0, 40.0), 1500).text(),
            "G1 X0.000 Y40.000 F1500"
        );
        assert_eq!(move_z(0.4, 1500).text(), "G1 Z0.400 F1500");
        assert_eq!(layer_lift(1500).text(), "G1 Z7 F1500");
        assert_eq!(clean_lift(900).text(), "G1 Z3 F900");
        assert_eq!(retract(1.0).text(), "G1 E-1.0 F200");
        assert_eq!(clean_wipe(Axis::Y, 85.0, 1500).text(), "G1 Y85.000 Z0 F1500");
        assert_eq!(move_axis(Axis::X, 90.0, 1500).text(), "G1 X90.000 F1500");
        assert_eq!(dwell(250).text(), "G4 P250");
    }

    #[test]
    fn test_expectations() {
        assert_eq!(finish_moves().expect(), Expect::Ack);
        assert_eq!(plunger_to(53).expect(), Expect::Nothing);
        assert_eq!(plunger_to(53).text(), "G1 E53 F200");
    }
}
