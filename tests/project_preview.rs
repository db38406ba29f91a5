use fiberkit::{render_program, AppConfig, Configuration, ProjectFile};
use fiberkit_core::Preset;
use fiberkit_settings::read_project;
use tempfile::TempDir;

#[test]
fn test_project_file_renders_expected_program() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("single.json");
    std::fs::write(
        &path,
        r#"{ "Mode": "CustomCentered", "Fiber Width": 0.0, "Clean": false, "Afterdrop": false }"#,
    )
    .unwrap();

    let parameters = read_project(&path, &AppConfig::default().initial_configuration()).unwrap();
    let lines: Vec<String> = render_program(&parameters)
        .unwrap()
        .iter()
        .map(|c| c.text().to_string())
        .collect();

    assert_eq!(lines.first().map(String::as_str), Some("M220 S100"));
    assert!(lines.contains(&"G1 X0.000 Y40.000 F1500".to_string()));
    assert!(lines.contains(&"G1 X80.000 Y40.000 F1500".to_string()));
    assert_eq!(lines.iter().filter(|l| *l == "M400").count(), 1);
    assert_eq!(lines.last().map(String::as_str), Some("G0 X10 Y190 Z30 F3000"));
}

#[test]
fn test_saved_project_reloads_identically() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("full.json");

    let mut config = Configuration::default();
    config.layers = 2;
    config.start_x = 5.0;
    std::fs::write(&path, ProjectFile::from(&config).to_json().unwrap()).unwrap();

    let base = Configuration::from_preset(Preset::LegacyBench);
    let reloaded = read_project(&path, &base).unwrap();
    assert_eq!(reloaded, config);
}
