//! Project files
//!
//! A project is the full run parameter set written as pretty JSON with
//! human readable keys. Loading merges: keys missing from the file keep the
//! value already in the store, so files written by older versions still load.

use std::path::Path;

use fiberkit_core::{
    ConfigStore, Configuration, Cups, FiberOrientation, Mode, Orientation,
};
use serde::{Deserialize, Serialize};

use crate::error::SettingsResult;

/// On-disk project layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(rename = "Mode", skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,

    #[serde(rename = "Layers", skip_serializing_if = "Option::is_none")]
    pub layers: Option<u32>,
    #[serde(rename = "Orientation", skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(rename = "Cups", skip_serializing_if = "Option::is_none")]
    pub cups: Option<Cups>,

    #[serde(rename = "Speed", skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
    #[serde(rename = "Step", skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(rename = "Droplet Amount", skip_serializing_if = "Option::is_none")]
    pub droplet_amount: Option<f64>,
    #[serde(rename = "Z-Hop", skip_serializing_if = "Option::is_none")]
    pub z_hop: Option<f64>,
    #[serde(rename = "Pause (ms)", skip_serializing_if = "Option::is_none")]
    pub pause_ms: Option<u32>,
    #[serde(rename = "Z-Offset", skip_serializing_if = "Option::is_none")]
    pub z_offset: Option<f64>,
    #[serde(rename = "Afterdrop", skip_serializing_if = "Option::is_none")]
    pub afterdrop: Option<bool>,
    #[serde(rename = "Clean", skip_serializing_if = "Option::is_none")]
    pub clean: Option<bool>,

    #[serde(rename = "Syringe Current Amount", skip_serializing_if = "Option::is_none")]
    pub syringe_current_amount: Option<f64>,
    #[serde(rename = "Syringe Droplet Units", skip_serializing_if = "Option::is_none")]
    pub syringe_droplet_units: Option<u32>,

    #[serde(rename = "Safe X Min", skip_serializing_if = "Option::is_none")]
    pub safe_x_min: Option<f64>,
    #[serde(rename = "Safe X Max", skip_serializing_if = "Option::is_none")]
    pub safe_x_max: Option<f64>,
    #[serde(rename = "Safe Y Min", skip_serializing_if = "Option::is_none")]
    pub safe_y_min: Option<f64>,
    #[serde(rename = "Safe Y Max", skip_serializing_if = "Option::is_none")]
    pub safe_y_max: Option<f64>,

    #[serde(rename = "Start X", skip_serializing_if = "Option::is_none")]
    pub start_x: Option<f64>,
    #[serde(rename = "Start Y", skip_serializing_if = "Option::is_none")]
    pub start_y: Option<f64>,

    #[serde(rename = "Fiber Orientation", skip_serializing_if = "Option::is_none")]
    pub fiber_orientation: Option<FiberOrientation>,
    #[serde(rename = "Fiber Length", skip_serializing_if = "Option::is_none")]
    pub fiber_length: Option<f64>,
    #[serde(rename = "Fiber Width", skip_serializing_if = "Option::is_none")]
    pub fiber_width: Option<f64>,
    #[serde(rename = "Fiber Spacing", skip_serializing_if = "Option::is_none")]
    pub fiber_spacing: Option<f64>,
}

impl From<&Configuration> for ProjectFile {
    fn from(c: &Configuration) -> Self {
        Self {
            mode: Some(c.mode),
            layers: Some(c.layers),
            orientation: Some(c.orientation),
            cups: Some(c.cups),
            speed: Some(c.speed),
            step: Some(c.step),
            droplet_amount: Some(c.droplet_amount),
            z_hop: Some(c.z_hop),
            pause_ms: Some(c.pause_ms),
            z_offset: Some(c.z_offset),
            afterdrop: Some(c.afterdrop),
            clean: Some(c.clean),
            syringe_current_amount: Some(c.syringe_current_amount),
            syringe_droplet_units: Some(c.syringe_droplet_units),
            safe_x_min: Some(c.safe_x_min),
            safe_x_max: Some(c.safe_x_max),
            safe_y_min: Some(c.safe_y_min),
            safe_y_max: Some(c.safe_y_max),
            start_x: Some(c.start_x),
            start_y: Some(c.start_y),
            fiber_orientation: Some(c.fiber_orientation),
            fiber_length: Some(c.fiber_length),
            fiber_width: Some(c.fiber_width),
            fiber_spacing: Some(c.fiber_spacing),
        }
    }
}

macro_rules! merge_fields {
    ($project:expr, $config:expr, [$($field:ident),* $(,)?]) => {
        $(
            if let Some(value) = $project.$field {
                $config.$field = value;
            }
        )*
    };
}

impl ProjectFile {
    /// Parse a project from JSON text
    pub fn from_json(text: &str) -> SettingsResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the project as pretty JSON
    pub fn to_json(&self) -> SettingsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Overlay the keys present in this file onto `base`
    pub fn merge_into(&self, base: &Configuration) -> Configuration {
        let mut config = base.clone();
        merge_fields!(
            self,
            config,
            [
                mode,
                layers,
                orientation,
                cups,
                speed,
                step,
                droplet_amount,
                z_hop,
                pause_ms,
                z_offset,
                afterdrop,
                clean,
                syringe_current_amount,
                syringe_droplet_units,
                safe_x_min,
                safe_x_max,
                safe_y_min,
                safe_y_max,
                start_x,
                start_y,
                fiber_orientation,
                fiber_length,
                fiber_width,
                fiber_spacing,
            ]
        );
        config
    }
}

/// Write the store's current parameters to `path`
pub fn save_project(store: &ConfigStore, path: &Path) -> SettingsResult<()> {
    let project = ProjectFile::from(&store.snapshot());
    std::fs::write(path, project.to_json()?)?;
    tracing::info!("Project saved");
    Ok(())
}

/// Read `path` and apply it on top of the store's current parameters.
///
/// Nothing is written to the store if the file fails to parse or the merged
/// parameters are invalid.
pub fn load_project(store: &ConfigStore, path: &Path) -> SettingsResult<Configuration> {
    let text = std::fs::read_to_string(path)?;
    let project = ProjectFile::from_json(&text)?;
    let merged = project.merge_into(&store.snapshot());
    merged.validate()?;
    store.apply(&merged)?;
    tracing::info!("Loaded project");
    Ok(merged)
}

/// Read `path` on top of `base` without touching any store
pub fn read_project(path: &Path, base: &Configuration) -> SettingsResult<Configuration> {
    let text = std::fs::read_to_string(path)?;
    let merged = ProjectFile::from_json(&text)?.merge_into(base);
    merged.validate()?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_readable_keys() {
        let json = ProjectFile::from(&Configuration::default()).to_json().unwrap();
        for key in [
            "\"Mode\": \"CustomCentered\"",
            "\"Pause (ms)\": 0",
            "\"Z-Offset\": 0.4",
            "\"Fiber Orientation\": \"Horizontal\"",
            "\"Safe Y Min\": 20.0",
            "\"Cups\": 9",
        ] {
            assert!(json.contains(key), "missing {} in {}", key, json);
        }
    }

    #[test]
    fn test_missing_keys_keep_base_values() {
        let project = ProjectFile::from_json(r#"{ "Layers": 4, "Fiber Length": 60.0 }"#).unwrap();
        let base = Configuration::default();
        let merged = project.merge_into(&base);
        assert_eq!(merged.layers, 4);
        assert_eq!(merged.fiber_length, 60.0);
        assert_eq!(merged.fiber_width, base.fiber_width);
        assert_eq!(merged.mode, base.mode);
    }

    #[test]
    fn test_unknown_enum_strings_are_rejected() {
        assert!(ProjectFile::from_json(r#"{ "Mode": "Spiral" }"#).is_err());
        assert!(ProjectFile::from_json(r#"{ "Orientation": "Diagonal" }"#).is_err());
        assert!(ProjectFile::from_json(r#"{ "Cups": 4 }"#).is_err());
    }
}
