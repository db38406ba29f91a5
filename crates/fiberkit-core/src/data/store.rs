//! Live configuration store.
//!
//! The store is shared between the operator surface and the run executor.
//! Every field lives in its own atomic cell and is read and written
//! independently with relaxed ordering: no lock is taken, a write is visible
//! to the next read of that field, and a read of several fields (for example
//! the four safe bounds) may observe a mixture of old and new values while an
//! edit is in progress. Runs pick up edits command group by command group.

use super::{Configuration, Cups, FiberOrientation, Mode, Orientation, Rect};
use crate::error::ConfigError;
use crate::event_bus::{AppEvent, ConfigEvent, EventBus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier of a configuration field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamId {
    Mode,
    Layers,
    Orientation,
    Cups,
    Speed,
    Step,
    DropletAmount,
    ZHop,
    PauseMs,
    ZOffset,
    Afterdrop,
    Clean,
    SyringeCurrentAmount,
    SyringeDropletUnits,
    SafeXMin,
    SafeXMax,
    SafeYMin,
    SafeYMax,
    StartX,
    StartY,
    FiberOrientation,
    FiberLength,
    FiberWidth,
    FiberSpacing,
}

/// Storage kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Float,
    UInt,
    Bool,
    Mode,
    Orientation,
    FiberOrientation,
    Cups,
}

impl ParamKind {
    fn describe(self) -> &'static str {
        match self {
            ParamKind::Float => "float",
            ParamKind::UInt => "unsigned integer",
            ParamKind::Bool => "boolean",
            ParamKind::Mode => "mode",
            ParamKind::Orientation => "orientation",
            ParamKind::FiberOrientation => "fiber orientation",
            ParamKind::Cups => "cup count",
        }
    }
}

impl ParamId {
    /// Every field, in declaration order
    pub const ALL: [ParamId; 24] = [
        ParamId::Mode,
        ParamId::Layers,
        ParamId::Orientation,
        ParamId::Cups,
        ParamId::Speed,
        ParamId::Step,
        ParamId::DropletAmount,
        ParamId::ZHop,
        ParamId::PauseMs,
        ParamId::ZOffset,
        ParamId::Afterdrop,
        ParamId::Clean,
        ParamId::SyringeCurrentAmount,
        ParamId::SyringeDropletUnits,
        ParamId::SafeXMin,
        ParamId::SafeXMax,
        ParamId::SafeYMin,
        ParamId::SafeYMax,
        ParamId::StartX,
        ParamId::StartY,
        ParamId::FiberOrientation,
        ParamId::FiberLength,
        ParamId::FiberWidth,
        ParamId::FiberSpacing,
    ];

    /// Field name as used by the operator surface
    pub fn name(self) -> &'static str {
        match self {
            ParamId::Mode => "mode",
            ParamId::Layers => "layers",
            ParamId::Orientation => "orientation",
            ParamId::Cups => "cups",
            ParamId::Speed => "speed",
            ParamId::Step => "step",
            ParamId::DropletAmount => "droplet_amount",
            ParamId::ZHop => "z_hop",
            ParamId::PauseMs => "pause_ms",
            ParamId::ZOffset => "z_offset",
            ParamId::Afterdrop => "afterdrop",
            ParamId::Clean => "clean",
            ParamId::SyringeCurrentAmount => "syringe_current_amount",
            ParamId::SyringeDropletUnits => "syringe_droplet_units",
            ParamId::SafeXMin => "safe_x_min",
            ParamId::SafeXMax => "safe_x_max",
            ParamId::SafeYMin => "safe_y_min",
            ParamId::SafeYMax => "safe_y_max",
            ParamId::StartX => "start_x",
            ParamId::StartY => "start_y",
            ParamId::FiberOrientation => "fiber_orientation",
            ParamId::FiberLength => "fiber_length",
            ParamId::FiberWidth => "fiber_width",
            ParamId::FiberSpacing => "fiber_spacing",
        }
    }

    /// Storage kind of the field
    pub fn kind(self) -> ParamKind {
        match self {
            ParamId::Mode => ParamKind::Mode,
            ParamId::Orientation => ParamKind::Orientation,
            ParamId::FiberOrientation => ParamKind::FiberOrientation,
            ParamId::Cups => ParamKind::Cups,
            ParamId::Layers
            | ParamId::Speed
            | ParamId::PauseMs
            | ParamId::SyringeDropletUnits => ParamKind::UInt,
            ParamId::Afterdrop | ParamId::Clean => ParamKind::Bool,
            _ => ParamKind::Float,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamId::ALL
            .iter()
            .copied()
            .find(|id| id.name() == s)
            .ok_or_else(|| ConfigError::UnknownField {
                name: s.to_string(),
            })
    }
}

/// A typed configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f64),
    UInt(u32),
    Bool(bool),
    Mode(Mode),
    Orientation(Orientation),
    FiberOrientation(FiberOrientation),
    Cups(Cups),
    /// Textual form, parsed against the field kind on write
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::UInt(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Mode(v) => write!(f, "{}", v),
            ParamValue::Orientation(v) => write!(f, "{}", v),
            ParamValue::FiberOrientation(v) => write!(f, "{}", v),
            ParamValue::Cups(v) => write!(f, "{}", v),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

fn mismatch(id: ParamId) -> ConfigError {
    ConfigError::TypeMismatch {
        field: id.name().to_string(),
        expected: id.kind().describe(),
    }
}

fn invalid(id: ParamId, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: id.name().to_string(),
        reason: reason.into(),
    }
}

fn mode_bits(mode: Mode) -> u64 {
    match mode {
        Mode::Legacy => 0,
        Mode::CustomCentered => 1,
    }
}

fn orientation_bits(orientation: Orientation) -> u64 {
    match orientation {
        Orientation::Horizontal => 0,
        Orientation::Vertical => 1,
        Orientation::Both => 2,
    }
}

fn fiber_bits(orientation: FiberOrientation) -> u64 {
    match orientation {
        FiberOrientation::Horizontal => 0,
        FiberOrientation::Vertical => 1,
    }
}

/// Encode a value into the cell representation of `id`
fn encode(id: ParamId, value: &ParamValue) -> Result<u64, ConfigError> {
    match (id.kind(), value) {
        (ParamKind::Float, ParamValue::Float(v)) => {
            if !v.is_finite() {
                return Err(invalid(id, "value must be finite"));
            }
            Ok(v.to_bits())
        }
        (ParamKind::Float, ParamValue::UInt(v)) => Ok(f64::from(*v).to_bits()),
        (ParamKind::Float, ParamValue::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| mismatch(id))
            .and_then(|v| encode(id, &ParamValue::Float(v))),
        (ParamKind::UInt, ParamValue::UInt(v)) => {
            if id == ParamId::Layers && *v == 0 {
                return Err(invalid(id, "layers must be >= 1"));
            }
            Ok(u64::from(*v))
        }
        (ParamKind::UInt, ParamValue::Text(s)) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| mismatch(id))
            .and_then(|v| encode(id, &ParamValue::UInt(v))),
        (ParamKind::Bool, ParamValue::Bool(v)) => Ok(u64::from(*v)),
        (ParamKind::Bool, ParamValue::Text(s)) => match s.trim() {
            "true" | "on" | "1" => Ok(1),
            "false" | "off" | "0" => Ok(0),
            _ => Err(mismatch(id)),
        },
        (ParamKind::Mode, ParamValue::Mode(v)) => Ok(mode_bits(*v)),
        (ParamKind::Mode, ParamValue::Text(s)) => Ok(mode_bits(s.trim().parse()?)),
        (ParamKind::Orientation, ParamValue::Orientation(v)) => Ok(orientation_bits(*v)),
        (ParamKind::Orientation, ParamValue::Text(s)) => {
            Ok(orientation_bits(s.trim().parse()?))
        }
        (ParamKind::FiberOrientation, ParamValue::FiberOrientation(v)) => Ok(fiber_bits(*v)),
        (ParamKind::FiberOrientation, ParamValue::Text(s)) => Ok(fiber_bits(s.trim().parse()?)),
        (ParamKind::Cups, ParamValue::Cups(v)) => Ok(u64::from(v.count())),
        (ParamKind::Cups, ParamValue::UInt(v)) => {
            let count = u8::try_from(*v).map_err(|_| invalid(id, "cups must be 3, 6 or 9"))?;
            Ok(u64::from(Cups::try_from(count)?.count()))
        }
        (ParamKind::Cups, ParamValue::Text(s)) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| mismatch(id))
            .and_then(|v| encode(id, &ParamValue::UInt(v))),
        _ => Err(mismatch(id)),
    }
}

/// Decode a cell back into a value; cells only ever hold encoded values
fn decode(id: ParamId, bits: u64) -> ParamValue {
    match id.kind() {
        ParamKind::Float => ParamValue::Float(f64::from_bits(bits)),
        ParamKind::UInt => ParamValue::UInt(bits as u32),
        ParamKind::Bool => ParamValue::Bool(bits != 0),
        ParamKind::Mode => ParamValue::Mode(if bits == 0 {
            Mode::Legacy
        } else {
            Mode::CustomCentered
        }),
        ParamKind::Orientation => ParamValue::Orientation(match bits {
            0 => Orientation::Horizontal,
            1 => Orientation::Vertical,
            _ => Orientation::Both,
        }),
        ParamKind::FiberOrientation => ParamValue::FiberOrientation(if bits == 0 {
            FiberOrientation::Horizontal
        } else {
            FiberOrientation::Vertical
        }),
        ParamKind::Cups => ParamValue::Cups(match bits {
            3 => Cups::Three,
            6 => Cups::Six,
            _ => Cups::Nine,
        }),
    }
}

/// Shared, lock-free configuration store
pub struct ConfigStore {
    cells: [AtomicU64; 24],
    bus: Option<Arc<EventBus>>,
}

impl ConfigStore {
    /// Create a store holding the given configuration
    pub fn new(initial: &Configuration) -> Self {
        let store = Self {
            cells: std::array::from_fn(|_| AtomicU64::new(0)),
            bus: None,
        };
        store.write_all(initial);
        store
    }

    /// Create a store that announces every write on `bus`
    pub fn with_event_bus(initial: &Configuration, bus: Arc<EventBus>) -> Self {
        let mut store = Self::new(initial);
        store.bus = Some(bus);
        store
    }

    fn load(&self, id: ParamId) -> u64 {
        self.cells[id.index()].load(Ordering::Relaxed)
    }

    fn store_bits(&self, id: ParamId, bits: u64) {
        self.cells[id.index()].store(bits, Ordering::Relaxed);
    }

    fn float(&self, id: ParamId) -> f64 {
        f64::from_bits(self.load(id))
    }

    fn uint(&self, id: ParamId) -> u32 {
        self.load(id) as u32
    }

    fn flag(&self, id: ParamId) -> bool {
        self.load(id) != 0
    }

    fn announce(&self, id: ParamId) {
        if let Some(bus) = &self.bus {
            let _ = bus.publish(AppEvent::Config(ConfigEvent::Changed {
                field: id,
                value: self.get(id),
            }));
        }
    }

    /// Read one field
    pub fn get(&self, id: ParamId) -> ParamValue {
        decode(id, self.load(id))
    }

    /// Write one field, checked against the field's kind
    pub fn set(&self, id: ParamId, value: ParamValue) -> Result<(), ConfigError> {
        let bits = encode(id, &value)?;
        self.store_bits(id, bits);
        tracing::debug!("param {} = {}", id, decode(id, bits));
        self.announce(id);
        Ok(())
    }

    /// Read one field by name
    pub fn get_by_name(&self, name: &str) -> Result<ParamValue, ConfigError> {
        Ok(self.get(name.parse()?))
    }

    /// Write one field by name; unknown names fail with `UnknownField`
    pub fn set_by_name(&self, name: &str, value: ParamValue) -> Result<(), ConfigError> {
        self.set(name.parse()?, value)
    }

    /// Read every field into a plain configuration
    ///
    /// Fields are read one after another, not as an atomic unit.
    pub fn snapshot(&self) -> Configuration {
        Configuration {
            mode: self.mode(),
            layers: self.layers(),
            orientation: self.orientation(),
            cups: self.cups(),
            speed: self.speed(),
            step: self.step(),
            droplet_amount: self.droplet_amount(),
            z_hop: self.z_hop(),
            pause_ms: self.pause_ms(),
            z_offset: self.z_offset(),
            afterdrop: self.afterdrop(),
            clean: self.clean(),
            syringe_current_amount: self.syringe_current_amount(),
            syringe_droplet_units: self.syringe_droplet_units(),
            safe_x_min: self.float(ParamId::SafeXMin),
            safe_x_max: self.float(ParamId::SafeXMax),
            safe_y_min: self.float(ParamId::SafeYMin),
            safe_y_max: self.float(ParamId::SafeYMax),
            start_x: self.start_x(),
            start_y: self.start_y(),
            fiber_orientation: self.fiber_orientation(),
            fiber_length: self.fiber_length(),
            fiber_width: self.fiber_width(),
            fiber_spacing: self.fiber_spacing(),
        }
    }

    /// Overwrite every field from a plain configuration
    pub fn apply(&self, config: &Configuration) -> Result<(), ConfigError> {
        config.validate()?;
        self.write_all(config);
        for id in ParamId::ALL {
            self.announce(id);
        }
        Ok(())
    }

    fn write_all(&self, c: &Configuration) {
        let values = [
            (ParamId::Mode, mode_bits(c.mode)),
            (ParamId::Layers, u64::from(c.layers)),
            (ParamId::Orientation, orientation_bits(c.orientation)),
            (ParamId::Cups, u64::from(c.cups.count())),
            (ParamId::Speed, u64::from(c.speed)),
            (ParamId::Step, c.step.to_bits()),
            (ParamId::DropletAmount, c.droplet_amount.to_bits()),
            (ParamId::ZHop, c.z_hop.to_bits()),
            (ParamId::PauseMs, u64::from(c.pause_ms)),
            (ParamId::ZOffset, c.z_offset.to_bits()),
            (ParamId::Afterdrop, u64::from(c.afterdrop)),
            (ParamId::Clean, u64::from(c.clean)),
            (
                ParamId::SyringeCurrentAmount,
                c.syringe_current_amount.to_bits(),
            ),
            (
                ParamId::SyringeDropletUnits,
                u64::from(c.syringe_droplet_units),
            ),
            (ParamId::SafeXMin, c.safe_x_min.to_bits()),
            (ParamId::SafeXMax, c.safe_x_max.to_bits()),
            (ParamId::SafeYMin, c.safe_y_min.to_bits()),
            (ParamId::SafeYMax, c.safe_y_max.to_bits()),
            (ParamId::StartX, c.start_x.to_bits()),
            (ParamId::StartY, c.start_y.to_bits()),
            (ParamId::FiberOrientation, fiber_bits(c.fiber_orientation)),
            (ParamId::FiberLength, c.fiber_length.to_bits()),
            (ParamId::FiberWidth, c.fiber_width.to_bits()),
            (ParamId::FiberSpacing, c.fiber_spacing.to_bits()),
        ];
        for (id, bits) in values {
            self.store_bits(id, bits);
        }
    }

    /// Add `delta` to the syringe ledger and return the new amount
    ///
    /// The read-modify-write is a single atomic update so concurrent ledger
    /// adjustments are not lost.
    pub fn adjust_syringe(&self, delta: f64) -> f64 {
        let cell = &self.cells[ParamId::SyringeCurrentAmount.index()];
        let previous = cell
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + delta).to_bits())
            })
            .unwrap_or_else(|bits| bits);
        self.announce(ParamId::SyringeCurrentAmount);
        f64::from_bits(previous) + delta
    }

    /// Overwrite the syringe ledger
    pub fn reset_syringe(&self, amount: f64) {
        self.store_bits(ParamId::SyringeCurrentAmount, amount.to_bits());
        self.announce(ParamId::SyringeCurrentAmount);
    }

    pub fn mode(&self) -> Mode {
        match self.get(ParamId::Mode) {
            ParamValue::Mode(m) => m,
            _ => Mode::CustomCentered,
        }
    }

    pub fn layers(&self) -> u32 {
        self.uint(ParamId::Layers)
    }

    pub fn orientation(&self) -> Orientation {
        match self.get(ParamId::Orientation) {
            ParamValue::Orientation(o) => o,
            _ => Orientation::Horizontal,
        }
    }

    pub fn cups(&self) -> Cups {
        match self.get(ParamId::Cups) {
            ParamValue::Cups(c) => c,
            _ => Cups::Nine,
        }
    }

    pub fn speed(&self) -> u32 {
        self.uint(ParamId::Speed)
    }

    pub fn step(&self) -> f64 {
        self.float(ParamId::Step)
    }

    pub fn droplet_amount(&self) -> f64 {
        self.float(ParamId::DropletAmount)
    }

    pub fn z_hop(&self) -> f64 {
        self.float(ParamId::ZHop)
    }

    pub fn pause_ms(&self) -> u32 {
        self.uint(ParamId::PauseMs)
    }

    pub fn z_offset(&self) -> f64 {
        self.float(ParamId::ZOffset)
    }

    pub fn afterdrop(&self) -> bool {
        self.flag(ParamId::Afterdrop)
    }

    pub fn clean(&self) -> bool {
        self.flag(ParamId::Clean)
    }

    pub fn syringe_current_amount(&self) -> f64 {
        self.float(ParamId::SyringeCurrentAmount)
    }

    pub fn syringe_droplet_units(&self) -> u32 {
        self.uint(ParamId::SyringeDropletUnits)
    }

    /// Safe rectangle, each bound read independently
    pub fn safe_rect(&self) -> Rect {
        Rect::new(
            self.float(ParamId::SafeXMin),
            self.float(ParamId::SafeXMax),
            self.float(ParamId::SafeYMin),
            self.float(ParamId::SafeYMax),
        )
    }

    pub fn start_x(&self) -> f64 {
        self.float(ParamId::StartX)
    }

    pub fn start_y(&self) -> f64 {
        self.float(ParamId::StartY)
    }

    pub fn fiber_orientation(&self) -> FiberOrientation {
        match self.get(ParamId::FiberOrientation) {
            ParamValue::FiberOrientation(o) => o,
            _ => FiberOrientation::Horizontal,
        }
    }

    pub fn fiber_length(&self) -> f64 {
        self.float(ParamId::FiberLength)
    }

    pub fn fiber_width(&self) -> f64 {
        self.float(ParamId::FiberWidth)
    }

    pub fn fiber_spacing(&self) -> f64 {
        self.float(ParamId::FiberSpacing)
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(&Configuration::default())
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("config", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::{EventCategory, EventFilter};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_snapshot_round_trips_initial_configuration() {
        let config = Configuration::default();
        let store = ConfigStore::new(&config);
        assert_eq!(store.snapshot(), config);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let store = ConfigStore::default();
        let err = store
            .set_by_name("nozzle_temp", ParamValue::Float(200.0))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownField {
                name: "nozzle_temp".to_string()
            }
        );
        assert!(store.get_by_name("nozzle_temp").is_err());
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let store = ConfigStore::default();
        let err = store
            .set(ParamId::Afterdrop, ParamValue::Float(1.0))
            .unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { .. }));
    }

    #[test]
    fn test_text_values_are_parsed_against_field_kind() {
        let store = ConfigStore::default();
        store
            .set_by_name("mode", ParamValue::Text("Legacy".to_string()))
            .unwrap();
        store
            .set_by_name("fiber_spacing", ParamValue::Text("0.5".to_string()))
            .unwrap();
        store
            .set_by_name("cups", ParamValue::Text("6".to_string()))
            .unwrap();
        assert_eq!(store.mode(), Mode::Legacy);
        assert_eq!(store.fiber_spacing(), 0.5);
        assert_eq!(store.cups(), Cups::Six);
        assert!(store
            .set_by_name("cups", ParamValue::Text("4".to_string()))
            .is_err());
    }

    #[test]
    fn test_integer_promotes_to_float_field() {
        let store = ConfigStore::default();
        store.set(ParamId::FiberLength, ParamValue::UInt(120)).unwrap();
        assert_eq!(store.fiber_length(), 120.0);
    }

    #[test]
    fn test_zero_layers_rejected() {
        let store = ConfigStore::default();
        assert!(store.set(ParamId::Layers, ParamValue::UInt(0)).is_err());
        assert_eq!(store.layers(), 1);
    }

    #[test]
    fn test_ledger_adjustments() {
        let store = ConfigStore::default();
        store.reset_syringe(10.0);
        assert_eq!(store.adjust_syringe(-1.5), 8.5);
        assert_eq!(store.adjust_syringe(-1.5), 7.0);
        assert_eq!(store.syringe_current_amount(), 7.0);
    }

    #[test]
    fn test_writes_are_announced_on_bus() {
        let bus = Arc::new(EventBus::new());
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = changes.clone();
        bus.subscribe(
            EventFilter::Categories(vec![EventCategory::Config]),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        let store = ConfigStore::with_event_bus(&Configuration::default(), bus);
        store.set(ParamId::Speed, ParamValue::UInt(900)).unwrap();
        store.adjust_syringe(-1.0);
        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_writers_do_not_tear_single_fields() {
        let store = Arc::new(ConfigStore::default());
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..1000u32 {
                    let v = if i % 2 == 0 { 10.0 } else { 20.0 };
                    store.set(ParamId::ZHop, ParamValue::Float(v)).unwrap();
                }
            })
        };
        for _ in 0..1000 {
            let v = store.z_hop();
            assert!(v == 10.0 || v == 20.0);
        }
        writer.join().unwrap();
    }
}
