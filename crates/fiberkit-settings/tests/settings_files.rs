use std::sync::Arc;

use fiberkit_core::event_bus::{AppEvent, ConfigEvent, EventBus};
use fiberkit_core::{ConfigStore, Configuration, Mode, ParamId, Preset};
use fiberkit_settings::{load_project, save_project, AppConfig, SettingsError};
use tempfile::TempDir;

#[test]
fn test_app_config_roundtrip_toml_and_json() {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.connection.port = "/dev/ttyUSB0".to_string();
    config.connection.settle_delay_ms = 500;
    config.preset = Preset::LegacyBench;

    for name in ["settings.toml", "settings.json"] {
        let path = dir.path().join(name);
        config.save_to_file(&path).unwrap();
        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}

#[test]
fn test_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("fiberkit").join("settings.toml");
    AppConfig::default().save_to_file(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn test_invalid_file_is_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, "[connection]\nbaud_rate = 0\n").unwrap();
    assert!(matches!(
        AppConfig::load_from_file(&path),
        Err(SettingsError::InvalidSetting { .. })
    ));

    let yaml = dir.path().join("settings.yaml");
    std::fs::write(&yaml, "connection: {}").unwrap();
    assert!(matches!(
        AppConfig::load_from_file(&yaml),
        Err(SettingsError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_project_save_then_load_restores_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dish.json");

    let mut saved = Configuration::default();
    saved.layers = 3;
    saved.fiber_spacing = 2.0;
    saved.syringe_current_amount = 86.0;
    save_project(&ConfigStore::new(&saved), &path).unwrap();

    let store = ConfigStore::new(&Configuration::from_preset(Preset::LegacyBench));
    let loaded = load_project(&store, &path).unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(store.snapshot(), saved);
    assert_eq!(store.mode(), Mode::CustomCentered);
}

#[test]
fn test_partial_project_merges_and_publishes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.json");
    std::fs::write(&path, r#"{ "Fiber Width": 10.0, "Afterdrop": false }"#).unwrap();

    let bus = Arc::new(EventBus::with_run_log(256));
    let base = Configuration::default();
    let store = ConfigStore::with_event_bus(&base, bus.clone());

    let merged = load_project(&store, &path).unwrap();
    assert_eq!(merged.fiber_width, 10.0);
    assert!(!merged.afterdrop);
    assert_eq!(merged.fiber_length, base.fiber_length);
    assert!(bus.history().iter().any(|e| matches!(
        e,
        AppEvent::Config(ConfigEvent::Changed { field: ParamId::FiberWidth, .. })
    )));
}

#[test]
fn test_bad_project_leaves_store_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "Layers": 0, "Fiber Width": 5.0 }"#).unwrap();

    let base = Configuration::default();
    let store = ConfigStore::new(&base);
    assert!(matches!(
        load_project(&store, &path),
        Err(SettingsError::Config(_))
    ));
    assert_eq!(store.snapshot(), base);
}
