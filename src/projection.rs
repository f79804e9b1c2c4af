//! Snapshot -> typed control values
//!
//! Pure functions, one per control. Missing fields read as 0 / false.
//!
//! Two rules for out-of-range raw values:
//! - range-typed values (volume) clamp into their range
//! - enumerated values (backlight, gain) yield `None` when the index has no
//!   matching option, so a firmware that grows a new level shows as unknown
//!   instead of being mislabelled

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::client::{KEY_BACKLIGHT, KEY_GAIN, KEY_HTB, KEY_INPUT, KEY_MUTED, KEY_TRIODE, KEY_VOLUME};
use crate::snapshot::Snapshot;

pub const VOLUME_MIN: u8 = 0;
pub const VOLUME_MAX: u8 = 100;

/// Raw status readings are hundredths of a volt / degree
const CENTI: f64 = 100.0;

pub const STATUS_AC: &str = "ac";
pub const STATUS_TEMP_LEFT: &str = "temp_l";
pub const STATUS_TEMP_RIGHT: &str = "temp_r";
pub const STATUS_POWER: &str = "amp_pwr";

/// Input labels presented to users, in device index order
pub const INPUT_OPTIONS: &[&str] = &["Input 1", "Input 2", "Input 3", "Input 4", "Input 5"];
pub const BACKLIGHT_OPTIONS: &[&str] = &["Off", "Low", "Medium", "High"];
pub const GAIN_OPTIONS: &[&str] = &["Low", "Medium", "High"];

// =============================================================================
// Enumerated settings
// =============================================================================

/// Front panel backlight level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backlight {
    Off,
    Low,
    Medium,
    High,
}

impl Backlight {
    const ALL: [Backlight; 4] = [Self::Off, Self::Low, Self::Medium, Self::High];

    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.label() == label)
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        BACKLIGHT_OPTIONS[self as usize]
    }
}

/// Input gain level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gain {
    Low,
    Medium,
    High,
}

impl Gain {
    const ALL: [Gain; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|g| g.label() == label)
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        GAIN_OPTIONS[self as usize]
    }
}

impl fmt::Display for Backlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Field readers
// =============================================================================

/// Integer field, 0 when missing or not numeric
fn int_field(section: &Map<String, Value>, key: &str) -> i64 {
    match section.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::Bool(b)) => i64::from(*b),
        _ => 0,
    }
}

/// Boolean field. Firmware reports some flags as 0/1, so nonzero numbers are on.
fn flag_field(section: &Map<String, Value>, key: &str) -> bool {
    match section.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// Centi-unit field converted to whole units
fn centi_field(section: &Map<String, Value>, key: &str) -> f64 {
    section
        .get(key)
        .and_then(Value::as_f64)
        .map(|raw| raw / CENTI)
        .unwrap_or(0.0)
}

// =============================================================================
// Projections
// =============================================================================

/// Volume percentage, clamped to 0-100
pub fn volume(snapshot: &Snapshot) -> u8 {
    let raw = int_field(&snapshot.settings, KEY_VOLUME);
    raw.clamp(i64::from(VOLUME_MIN), i64::from(VOLUME_MAX)) as u8
}

/// Selected input as "Input N" (device index + 1)
pub fn input(snapshot: &Snapshot) -> Option<String> {
    let index = int_field(&snapshot.settings, KEY_INPUT);
    (index >= 0).then(|| format!("Input {}", index + 1))
}

/// Device index for an input label from [`INPUT_OPTIONS`]
pub fn input_index(label: &str) -> Option<u8> {
    INPUT_OPTIONS
        .iter()
        .position(|o| *o == label)
        .and_then(|i| u8::try_from(i).ok())
}

pub fn backlight(snapshot: &Snapshot) -> Option<Backlight> {
    Backlight::from_index(int_field(&snapshot.settings, KEY_BACKLIGHT))
}

pub fn gain(snapshot: &Snapshot) -> Option<Gain> {
    Gain::from_index(int_field(&snapshot.settings, KEY_GAIN))
}

/// Mains voltage in volts
pub fn ac_voltage(snapshot: &Snapshot) -> f64 {
    centi_field(&snapshot.status, STATUS_AC)
}

/// Left output stage temperature in °C
pub fn temp_left(snapshot: &Snapshot) -> f64 {
    centi_field(&snapshot.status, STATUS_TEMP_LEFT)
}

/// Right output stage temperature in °C
pub fn temp_right(snapshot: &Snapshot) -> f64 {
    centi_field(&snapshot.status, STATUS_TEMP_RIGHT)
}

pub fn power(snapshot: &Snapshot) -> bool {
    flag_field(&snapshot.status, STATUS_POWER)
}

pub fn muted(snapshot: &Snapshot) -> bool {
    flag_field(&snapshot.settings, KEY_MUTED)
}

/// Home theater bypass
pub fn htb(snapshot: &Snapshot) -> bool {
    flag_field(&snapshot.settings, KEY_HTB)
}

/// Triode mix; any nonzero mix counts as on
pub fn triode(snapshot: &Snapshot) -> bool {
    flag_field(&snapshot.settings, KEY_TRIODE)
}
