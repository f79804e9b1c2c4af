//! Control table
//!
//! Every user-facing control of the amplifier described as data: how to read
//! it from a [`Snapshot`] and which [`ControlCommand`] writes it. The adapter
//! and the HTTP API both dispatch through [`lookup`] instead of matching on
//! keys themselves.

use serde::Serialize;

use crate::client::{ControlCommand, HtbState, MuteState, PowerState};
use crate::projection::{self, Backlight, Gain, BACKLIGHT_OPTIONS, GAIN_OPTIONS, INPUT_OPTIONS, VOLUME_MAX, VOLUME_MIN};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy)]
pub enum ControlKind {
    Switch {
        read: fn(&Snapshot) -> bool,
        write: fn(bool) -> ControlCommand,
    },
    Select {
        options: &'static [&'static str],
        read: fn(&Snapshot) -> Option<String>,
        /// `None` when the label is not one of `options`
        write: fn(&str) -> Option<ControlCommand>,
    },
    Number {
        min: f64,
        max: f64,
        step: f64,
        unit: &'static str,
        read: fn(&Snapshot) -> f64,
        write: fn(u8) -> ControlCommand,
    },
    Sensor {
        unit: &'static str,
        read: fn(&Snapshot) -> f64,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ControlDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub kind: ControlKind,
}

impl ControlDescription {
    pub fn is_writable(&self) -> bool {
        !matches!(self.kind, ControlKind::Sensor { .. })
    }

    /// Evaluate against a snapshot
    pub fn project(&self, snapshot: &Snapshot) -> ControlValue {
        match self.kind {
            ControlKind::Switch { read, .. } => ControlValue::Switch { on: read(snapshot) },
            ControlKind::Select { read, .. } => ControlValue::Select {
                option: read(snapshot),
            },
            ControlKind::Number { read, .. } => ControlValue::Number {
                value: read(snapshot),
            },
            ControlKind::Sensor { read, .. } => ControlValue::Sensor {
                value: read(snapshot),
            },
        }
    }

    pub fn options(&self) -> &'static [&'static str] {
        match self.kind {
            ControlKind::Select { options, .. } => options,
            _ => &[],
        }
    }

    pub fn unit(&self) -> Option<&'static str> {
        match self.kind {
            ControlKind::Number { unit, .. } | ControlKind::Sensor { unit, .. } => Some(unit),
            _ => None,
        }
    }
}

/// Projected value of one control
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ControlValue {
    Switch { on: bool },
    /// `None` when the device reports an index with no matching option
    Select { option: Option<String> },
    Number { value: f64 },
    Sensor { value: f64 },
}

/// Serializable view of a control and its current value
#[derive(Debug, Clone, Serialize)]
pub struct ControlView {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub options: &'static [&'static str],
    pub writable: bool,
    pub value: ControlValue,
}

impl ControlView {
    pub fn new(description: &ControlDescription, snapshot: &Snapshot) -> Self {
        Self {
            key: description.key,
            name: description.name,
            icon: description.icon,
            unit: description.unit(),
            options: description.options(),
            writable: description.is_writable(),
            value: description.project(snapshot),
        }
    }
}

// =============================================================================
// Table
// =============================================================================

pub const CONTROLS: &[ControlDescription] = &[
    ControlDescription {
        key: "power",
        name: "Power",
        icon: "mdi:power",
        kind: ControlKind::Switch {
            read: projection::power,
            write: |on| ControlCommand::Power(PowerState::from(on)),
        },
    },
    ControlDescription {
        key: "mute",
        name: "Mute",
        icon: "mdi:volume-off",
        kind: ControlKind::Switch {
            read: projection::muted,
            write: |on| ControlCommand::Mute(MuteState::from(on)),
        },
    },
    ControlDescription {
        key: "htb",
        name: "Home Theater Bypass",
        icon: "mdi:theater",
        kind: ControlKind::Switch {
            read: projection::htb,
            write: |on| ControlCommand::Htb(HtbState::from(on)),
        },
    },
    ControlDescription {
        key: "triode",
        name: "Triode",
        icon: "mdi:transistor",
        kind: ControlKind::Switch {
            read: projection::triode,
            write: ControlCommand::Triode,
        },
    },
    ControlDescription {
        key: "input_selector",
        name: "Input Selector",
        icon: "mdi:audio-input-xlr",
        kind: ControlKind::Select {
            options: INPUT_OPTIONS,
            read: projection::input,
            write: |label| projection::input_index(label).map(ControlCommand::Input),
        },
    },
    ControlDescription {
        key: "backlight_selector",
        name: "Backlight LED Level",
        icon: "mdi:led-on",
        kind: ControlKind::Select {
            options: BACKLIGHT_OPTIONS,
            read: |s| projection::backlight(s).map(|b| b.label().to_string()),
            write: |label| Backlight::from_label(label).map(|b| ControlCommand::Backlight(b.index())),
        },
    },
    ControlDescription {
        key: "gain_selector",
        name: "Gain",
        icon: "mdi:volume-high",
        kind: ControlKind::Select {
            options: GAIN_OPTIONS,
            read: |s| projection::gain(s).map(|g| g.label().to_string()),
            write: |label| Gain::from_label(label).map(|g| ControlCommand::Gain(g.index())),
        },
    },
    ControlDescription {
        key: "volume",
        name: "Volume",
        icon: "mdi:volume-high",
        kind: ControlKind::Number {
            min: VOLUME_MIN as f64,
            max: VOLUME_MAX as f64,
            step: 1.0,
            unit: "%",
            read: |s| f64::from(projection::volume(s)),
            write: ControlCommand::Volume,
        },
    },
    ControlDescription {
        key: "ac_voltage",
        name: "AC Voltage",
        icon: "mdi:flash",
        kind: ControlKind::Sensor {
            unit: "V",
            read: projection::ac_voltage,
        },
    },
    ControlDescription {
        key: "temp_l",
        name: "PA Left",
        icon: "mdi:thermometer",
        kind: ControlKind::Sensor {
            unit: "°C",
            read: projection::temp_left,
        },
    },
    ControlDescription {
        key: "temp_r",
        name: "PA Right",
        icon: "mdi:thermometer",
        kind: ControlKind::Sensor {
            unit: "°C",
            read: projection::temp_right,
        },
    },
];

pub fn lookup(key: &str) -> Option<&'static ControlDescription> {
    CONTROLS.iter().find(|c| c.key == key)
}

/// Every control with its projected value, in table order
pub fn project_all(snapshot: &Snapshot) -> Vec<ControlView> {
    CONTROLS
        .iter()
        .map(|c| ControlView::new(c, snapshot))
        .collect()
}
