use fiberkit_communication::{RecordingSink, Sequencer};
use fiberkit_core::{ConfigStore, Configuration, Mode, RunControl};
use fiberkit_planner::AnchoredParams;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_ledger_drops_two_droplets_per_line_with_afterdrop(
        width_steps in 0u32..20,
        spacing in prop::sample::select(vec![1.0f64, 2.0, 4.0]),
        droplet in prop::sample::select(vec![0.5f64, 1.0, 2.0]),
        layers in 1u32..4,
    ) {
        let mut config = Configuration::default();
        config.fiber_width = f64::from(width_steps) * spacing;
        config.fiber_spacing = spacing;
        config.droplet_amount = droplet;
        config.layers = layers;
        config.afterdrop = true;
        config.syringe_current_amount = 1000.0;

        let store = ConfigStore::new(&config);
        let lines = AnchoredParams::read(&store).line_count() as f64;
        let control = RunControl::new();
        control.start().unwrap();
        let mut sink = RecordingSink::new();
        Sequencer::new(&store, &control, &mut sink).run(Mode::CustomCentered).unwrap();

        let expected = 1000.0 - 2.0 * droplet * lines * f64::from(layers);
        prop_assert!((store.syringe_current_amount() - expected).abs() < 1e-9);
    }

    #[test]
    fn prop_ledger_drops_one_droplet_per_line_without_afterdrop(
        width_steps in 0u32..20,
        layers in 1u32..3,
    ) {
        let mut config = Configuration::default();
        config.fiber_width = f64::from(width_steps);
        config.layers = layers;
        config.afterdrop = false;
        config.syringe_current_amount = 500.0;

        let store = ConfigStore::new(&config);
        let control = RunControl::new();
        control.start().unwrap();
        let mut sink = RecordingSink::new();
        Sequencer::new(&store, &control, &mut sink).run(Mode::CustomCentered).unwrap();

        let lines = f64::from(width_steps + 1) * f64::from(layers);
        prop_assert!((store.syringe_current_amount() - (500.0 - lines)).abs() < 1e-9);
    }
}
