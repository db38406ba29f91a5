use std::sync::Arc;

use fiberkit_communication::{render_program, CommandSink, MachineCommand, Sequencer};
use fiberkit_core::{
    ConfigStore, Configuration, FiberOrientation, Mode, ParamId, ParamValue, Result, RunControl,
};

type Edit = Box<dyn FnMut(&ConfigStore, usize)>;

/// Records commands and edits the store each time a line finishes (`M400`)
struct EditingSink {
    store: Arc<ConfigStore>,
    lines: Vec<String>,
    barriers: usize,
    edit: Edit,
}

impl CommandSink for EditingSink {
    fn dispatch(&mut self, command: &MachineCommand) -> Result<()> {
        self.lines.push(command.text().to_string());
        if command.text() == "M400" {
            self.barriers += 1;
            (self.edit)(&self.store, self.barriers);
        }
        Ok(())
    }
}

fn run_with_edits(
    config: &Configuration,
    edit: impl FnMut(&ConfigStore, usize) + 'static,
) -> Vec<String> {
    let store = Arc::new(ConfigStore::new(config));
    let control = RunControl::new();
    control.start().unwrap();

    let mut sink = EditingSink {
        store: store.clone(),
        lines: Vec::new(),
        barriers: 0,
        edit: Box::new(edit),
    };
    Sequencer::new(&store, &control, &mut sink)
        .run(Mode::CustomCentered)
        .unwrap();
    sink.lines
}

/// Commands of scan line `n` (zero-based), ending with its `M400`
fn line_group(lines: &[String], n: usize) -> Vec<&str> {
    let barriers: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| *l == "M400")
        .map(|(i, _)| i)
        .collect();
    let end = barriers[n];
    let start = if n == 0 {
        lines
            .iter()
            .position(|l| l.starts_with("G1 Z7 "))
            .unwrap()
            + 1
    } else {
        barriers[n - 1] + 1
    };
    lines[start..=end].iter().map(String::as_str).collect()
}

#[test]
fn test_speed_edit_applies_from_the_next_line() {
    let lines = run_with_edits(&Configuration::default(), |store, barrier| {
        if barrier == 1 {
            store.set(ParamId::Speed, ParamValue::UInt(777)).unwrap();
        }
    });

    assert_eq!(
        line_group(&lines, 0)[..2],
        ["G1 X0.000 Y40.000 F1500", "G1 Z0.400 F1500"]
    );
    assert_eq!(
        line_group(&lines, 1),
        vec![
            "G1 X80.000 Y41.000 F777",
            "G1 Z0.400 F777",
            "G91",
            "G1 E-1.0 F200",
            "G4 P1000",
            "G90",
            "G1 Z10.000 F777",
            "G1 X0.000 Y41.000 F777",
            "G1 Z0.400 F777",
            "G91",
            "G1 E-1.0 F200",
            "G4 P500",
            "G90",
            "G1 F777",
            "G1 X0.000 Z0 F777",
            "G1 X0.000 F777",
            "G1 Z3 F777",
            "M400",
        ]
    );
}

#[test]
fn test_heights_and_pause_apply_from_the_next_line() {
    let lines = run_with_edits(&Configuration::default(), |store, barrier| {
        if barrier == 1 {
            store.set(ParamId::ZOffset, ParamValue::Float(0.6)).unwrap();
            store.set(ParamId::ZHop, ParamValue::Float(12.0)).unwrap();
            store.set(ParamId::PauseMs, ParamValue::UInt(300)).unwrap();
        }
    });

    let first = line_group(&lines, 0);
    assert!(first.contains(&"G1 Z10.000 F1500"));
    assert!(!first.iter().any(|l| l.starts_with("G4 P300")));

    let second = line_group(&lines, 1);
    assert_eq!(
        second[..9],
        [
            "G1 X80.000 Y41.000 F1500",
            "G1 Z0.600 F1500",
            "G91",
            "G1 E-1.0 F200",
            "G4 P1000",
            "G90",
            "G1 Z12.000 F1500",
            "G4 P300",
            "G1 X0.000 Y41.000 F1500",
        ]
    );
    assert_eq!(second[9], "G1 Z0.600 F1500");
}

#[test]
fn test_afterdrop_and_clean_toggle_between_lines() {
    let lines = run_with_edits(&Configuration::default(), |store, barrier| match barrier {
        1 => {
            store.set(ParamId::Afterdrop, ParamValue::Bool(false)).unwrap();
            store.set(ParamId::Clean, ParamValue::Bool(false)).unwrap();
        }
        2 => {
            store.set(ParamId::Afterdrop, ParamValue::Bool(true)).unwrap();
            store.set(ParamId::Clean, ParamValue::Bool(true)).unwrap();
        }
        _ => {}
    });

    let has_afterdrop = |group: &[&str]| group.contains(&"G4 P500");
    let has_clean = |group: &[&str]| group.iter().any(|l| l.starts_with("G1 Z3 "));

    let first = line_group(&lines, 0);
    assert!(has_afterdrop(&first) && has_clean(&first));

    let second = line_group(&lines, 1);
    assert!(!has_afterdrop(&second));
    assert!(!has_clean(&second));
    assert_eq!(second.len(), 10);

    let third = line_group(&lines, 2);
    assert!(has_afterdrop(&third) && has_clean(&third));
}

#[test]
fn test_vertical_clean_wipes_along_y() {
    let mut config = Configuration::default();
    config.fiber_orientation = FiberOrientation::Vertical;
    let program: Vec<String> = render_program(&config)
        .unwrap()
        .iter()
        .map(|c| c.text().to_string())
        .collect();

    // work rectangle x 0..40, y 40..120; line 0 runs up, line 1 runs down
    let first = line_group(&program, 0);
    assert_eq!(first[0], "G1 X0.000 Y40.000 F1500");
    assert_eq!(
        first[first.len() - 4..],
        ["G1 Y125.000 Z0 F1500", "G1 Y130.000 F1500", "G1 Z3 F1500", "M400"]
    );

    let second = line_group(&program, 1);
    assert_eq!(second[0], "G1 X1.000 Y120.000 F1500");
    assert_eq!(
        second[second.len() - 4..],
        ["G1 Y35.000 Z0 F1500", "G1 Y30.000 F1500", "G1 Z3 F1500", "M400"]
    );

    assert!(!program
        .iter()
        .any(|l| l.starts_with("G1 X") && l.contains(" Z0 ")));
}
