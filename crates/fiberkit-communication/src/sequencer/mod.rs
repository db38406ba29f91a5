//! # Command Sequencer
//!
//! Turns planned scan lines into Marlin commands and hands them, one at a
//! time, to a [`CommandSink`]. The run-control checkpoint is consulted before
//! every command, so pause holds the executor between two commands and stop
//! unwinds it without sending anything further (the footer included).
//!
//! Motion and deposition parameters are read from the live
//! [`ConfigStore`] right before the command group that uses them; the
//! anchored geometry is re-derived before every line. Containment in the
//! safe rectangle is checked once per layer.

mod sink;

pub use sink::{CommandSink, RecordingSink};

use std::sync::Arc;

use fiberkit_core::event_bus::{AppEvent, EventBus, RunEvent};
use fiberkit_core::{ConfigStore, Configuration, Mode, Rect, Result, RunControl};
use fiberkit_planner::anchored::{self, AnchoredParams};
use fiberkit_planner::{clean_path, legacy, ScanLine};

use crate::firmware::marlin::commands::{
    self, MachineCommand, AFTERDROP_DWELL_MS, DEPOSIT_DWELL_MS,
};

/// Check the geometry of every layer before anything is sent
pub fn preflight(store: &ConfigStore, mode: Mode) -> Result<()> {
    let safe = store.safe_rect();
    match mode {
        Mode::CustomCentered => {
            anchored::validate(&AnchoredParams::read(store), &safe)?;
        }
        Mode::Legacy => {
            for layer in 0..store.layers() {
                legacy::plan_layer(
                    layer,
                    store.orientation(),
                    store.cups(),
                    store.step(),
                    &safe,
                )?;
            }
        }
    }
    Ok(())
}

/// Emits one run's commands through a sink
pub struct Sequencer<'a> {
    store: &'a ConfigStore,
    control: &'a RunControl,
    sink: &'a mut dyn CommandSink,
    bus: Option<Arc<EventBus>>,
    sent: u64,
}

impl<'a> Sequencer<'a> {
    /// Create a sequencer reading `store`, gated by `control`
    pub fn new(
        store: &'a ConfigStore,
        control: &'a RunControl,
        sink: &'a mut dyn CommandSink,
    ) -> Self {
        Self {
            store,
            control,
            sink,
            bus: None,
            sent: 0,
        }
    }

    /// Publish layer and line progress on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Commands delivered so far
    pub fn commands_sent(&self) -> u64 {
        self.sent
    }

    /// Run every layer of `mode`, returning the number of commands sent.
    ///
    /// `mode` is latched by the caller; later edits to the stored mode do
    /// not affect this run.
    pub fn run(&mut self, mode: Mode) -> Result<u64> {
        preflight(self.store, mode)?;

        self.header()?;
        let layers = self.store.layers();
        for layer in 0..layers {
            match mode {
                Mode::CustomCentered => self.anchored_layer(layer)?,
                Mode::Legacy => self.legacy_layer(layer)?,
            }
        }
        self.footer()?;

        tracing::info!("Run complete: {} commands", self.sent);
        Ok(self.sent)
    }

    fn send(&mut self, command: MachineCommand) -> Result<()> {
        self.control.checkpoint()?;
        self.sink.dispatch(&command)?;
        self.sent += 1;
        Ok(())
    }

    fn header(&mut self) -> Result<()> {
        self.send(commands::reset_speed_override())?;
        self.send(commands::allow_cold_extrusion())?;
        self.send(commands::reset_flow_override())?;
        self.send(commands::absolute_positioning())?;
        self.send(commands::absolute_extrusion())?;
        self.send(commands::travel_height())?;
        self.send(commands::zero_extruder())
    }

    fn footer(&mut self) -> Result<()> {
        self.send(commands::tone())?;
        self.send(commands::park())
    }

    fn layer_preamble(&mut self) -> Result<()> {
        self.send(commands::absolute_positioning())?;
        self.send(commands::layer_lift(self.store.speed()))
    }

    fn anchored_layer(&mut self, layer: u32) -> Result<()> {
        let params = AnchoredParams::read(self.store);
        anchored::validate(&params, &self.store.safe_rect())?;
        let count = params.line_count();

        tracing::info!("Layer {}: {} lines", layer + 1, count);
        self.publish(RunEvent::LayerStarted {
            layer,
            lines: count,
        });
        self.layer_preamble()?;

        for index in 0..count {
            // Live edits apply from the next line on.
            let params = AnchoredParams::read(self.store);
            params.check()?;
            let Some(line) = params.scan_line(index) else {
                tracing::debug!("Line {} is past the far edge, ending layer", index + 1);
                break;
            };
            self.draw_line(layer, &line, &params.work_rect())?;
        }
        Ok(())
    }

    fn legacy_layer(&mut self, layer: u32) -> Result<()> {
        let sweeps = legacy::plan_layer(
            layer,
            self.store.orientation(),
            self.store.cups(),
            self.store.step(),
            &self.store.safe_rect(),
        )?;
        let count: usize = sweeps.iter().map(|s| s.lines.len()).sum();

        tracing::info!("Layer {}: {} lines in {} sweeps", layer + 1, count, sweeps.len());
        self.publish(RunEvent::LayerStarted {
            layer,
            lines: count,
        });
        self.layer_preamble()?;

        for sweep in &sweeps {
            for line in &sweep.lines {
                self.draw_line(layer, line, &sweep.work)?;
            }
        }
        Ok(())
    }

    fn draw_line(&mut self, layer: u32, line: &ScanLine, work: &Rect) -> Result<()> {
        self.publish(RunEvent::LineStarted {
            layer,
            line: line.index,
        });

        let speed = self.store.speed();
        let z_offset = self.store.z_offset();
        self.send(commands::move_xy(line.start(), speed))?;
        self.send(commands::move_z(z_offset, speed))?;

        self.deposit()?;

        let speed = self.store.speed();
        self.send(commands::move_z(self.store.z_hop(), speed))?;
        let pause_ms = self.store.pause_ms();
        if pause_ms > 0 {
            self.send(commands::dwell(pause_ms))?;
        }

        let z_offset = self.store.z_offset();
        self.send(commands::move_xy(line.end(), speed))?;
        self.send(commands::move_z(z_offset, speed))?;

        if self.store.afterdrop() {
            self.afterdrop()?;
        }

        if self.store.clean() {
            let speed = self.store.speed();
            let path = clean_path(line, work, &self.store.safe_rect());
            self.send(commands::clean_wipe(path.axis, path.near, speed))?;
            self.send(commands::move_axis(path.axis, path.far, speed))?;
            self.send(commands::clean_lift(speed))?;
        }

        self.send(commands::finish_moves())
    }

    /// Relative retract of one droplet, then back to absolute
    fn deposit(&mut self) -> Result<()> {
        let amount = self.store.droplet_amount();
        self.send(commands::relative_positioning())?;
        self.send(commands::retract(amount))?;
        self.send(commands::dwell(DEPOSIT_DWELL_MS))?;
        self.send(commands::absolute_positioning())?;
        self.store.adjust_syringe(-amount);
        Ok(())
    }

    fn afterdrop(&mut self) -> Result<()> {
        let amount = self.store.droplet_amount();
        self.send(commands::relative_positioning())?;
        self.send(commands::retract(amount))?;
        self.send(commands::dwell(AFTERDROP_DWELL_MS))?;
        self.send(commands::absolute_positioning())?;
        self.send(commands::set_feed(self.store.speed()))?;
        self.store.adjust_syringe(-amount);
        Ok(())
    }

    fn publish(&self, event: RunEvent) {
        if let Some(bus) = &self.bus {
            let _ = bus.publish(AppEvent::Run(event));
        }
    }
}

/// Render the full program for `config` without a transport.
///
/// Runs against a private copy of the configuration, so the syringe ledger
/// of the caller is untouched.
pub fn render_program(config: &Configuration) -> Result<Vec<MachineCommand>> {
    let store = ConfigStore::new(config);
    let control = RunControl::new();
    control.start()?;

    let mut sink = RecordingSink::new();
    Sequencer::new(&store, &control, &mut sink).run(config.mode)?;
    Ok(sink.commands().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiberkit_core::{Error, GeometryError};

    fn single_line() -> Configuration {
        let mut config = Configuration::default();
        config.fiber_width = 0.0;
        config
    }

    fn texts(commands: &[MachineCommand]) -> Vec<&str> {
        commands.iter().map(|c| c.text()).collect()
    }

    #[test]
    fn test_single_line_program() {
        let program = render_program(&single_line()).unwrap();
        assert_eq!(
            texts(&program),
            vec![
                "M220 S100",
                "M302 S0",
                "M221 S100",
                "G90",
                "M82",
                "G1 Z2 F1500",
                "G92 E0",
                "G90",
                "G1 Z7 F1500",
                "G1 X0.000 Y40.000 F1500",
                "G1 Z0.400 F1500",
                "G91",
                "G1 E-1.0 F200",
                "G4 P1000",
                "G90",
                "G1 Z10.000 F1500",
                "G1 X80.000 Y40.000 F1500",
                "G1 Z0.400 F1500",
                "G91",
                "G1 E-1.0 F200",
                "G4 P500",
                "G90",
                "G1 F1500",
                "G1 X85.000 Z0 F1500",
                "G1 X90.000 F1500",
                "G1 Z3 F1500",
                "M400",
                "M300 S440 P200",
                "G0 X10 Y190 Z30 F3000",
            ]
        );
    }

    #[test]
    fn test_pause_dwell_and_toggles() {
        let mut config = single_line();
        config.pause_ms = 250;
        config.afterdrop = false;
        config.clean = false;
        let program = render_program(&config).unwrap();
        let lines = texts(&program);
        assert!(lines.contains(&"G4 P250"));
        assert!(!lines.contains(&"G4 P500"));
        assert!(!lines.contains(&"G1 Z3 F1500"));
    }

    #[test]
    fn test_out_of_bounds_sends_nothing() {
        let mut config = Configuration::default();
        config.fiber_length = 200.0;

        let store = ConfigStore::new(&config);
        let control = RunControl::new();
        control.start().unwrap();
        let mut sink = RecordingSink::new();
        let result = Sequencer::new(&store, &control, &mut sink).run(Mode::CustomCentered);

        assert!(matches!(
            result,
            Err(Error::Geometry(GeometryError::OutOfBounds { .. }))
        ));
        assert!(sink.commands().is_empty());
    }

    #[test]
    fn test_stop_before_first_command_sends_nothing() {
        let store = ConfigStore::new(&Configuration::default());
        let control = RunControl::new();
        control.start().unwrap();
        control.stop();
        let mut sink = RecordingSink::new();
        let result = Sequencer::new(&store, &control, &mut sink).run(Mode::CustomCentered);

        assert!(result.map_err(|e| e.is_cancelled()).unwrap_err());
        assert!(sink.commands().is_empty());
    }

    #[test]
    fn test_layers_repeat_pattern() {
        let mut config = single_line();
        config.layers = 3;
        let program = render_program(&config).unwrap();
        let barriers = program.iter().filter(|c| c.text() == "M400").count();
        assert_eq!(barriers, 3);
    }

    #[test]
    fn test_legacy_program_runs_every_sweep() {
        let mut config = Configuration::from_preset(fiberkit_core::Preset::LegacyBench);
        config.step = 20.0;
        config.orientation = fiberkit_core::Orientation::Both;
        config.clean = false;
        config.afterdrop = false;

        let program = render_program(&config).unwrap();
        // step 20: horizontal 89.5..172 gives 5 lines, vertical 35..117 gives 5 lines
        let barriers = program.iter().filter(|c| c.text() == "M400").count();
        assert_eq!(barriers, 10);
        assert!(texts(&program).contains(&"G1 X34.500 Y89.500 F1500"));
        assert!(texts(&program).contains(&"G1 X35.000 Y90.000 F1500"));
    }
}
