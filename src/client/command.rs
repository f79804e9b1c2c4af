//! Control commands and their wire bodies
//!
//! The `control` endpoint takes two body shapes. Power is a top-level field:
//!
//! ```text
//! {"power": true}
//! ```
//!
//! Every other parameter nests under `settings`:
//!
//! ```text
//! {"settings": {"vol": 42}}
//! ```
//!
//! `ControlCommand::wire_body` is the only place that knows the difference.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Wire key for the volume setting
pub const KEY_VOLUME: &str = "vol";
/// Wire key for the selected input (zero-based)
pub const KEY_INPUT: &str = "src";
/// Wire key for the front panel backlight level
pub const KEY_BACKLIGHT: &str = "led_lvl";
/// Wire key for the gain level
pub const KEY_GAIN: &str = "gain";
/// Wire key for mute
pub const KEY_MUTED: &str = "muted";
/// Wire key for home theater bypass
pub const KEY_HTB: &str = "htb";
/// Wire key for the triode mix
pub const KEY_TRIODE: &str = "mix";
/// Top-level wire key for power
pub const KEY_POWER: &str = "power";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuteState {
    Muted,
    Unmuted,
}

/// Home theater bypass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HtbState {
    Enabled,
    Disabled,
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl From<bool> for MuteState {
    fn from(muted: bool) -> Self {
        if muted {
            Self::Muted
        } else {
            Self::Unmuted
        }
    }
}

impl From<bool> for HtbState {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

/// A single write to the amplifier's `control` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Power(PowerState),
    Mute(MuteState),
    /// Zero-based input index
    Input(u8),
    /// Zero-based backlight level index
    Backlight(u8),
    /// Volume 0-100
    Volume(u8),
    Htb(HtbState),
    Triode(bool),
    /// Zero-based gain level index
    Gain(u8),
}

impl ControlCommand {
    /// Wire key this command writes
    pub fn key(&self) -> &'static str {
        match self {
            Self::Power(_) => KEY_POWER,
            Self::Mute(_) => KEY_MUTED,
            Self::Input(_) => KEY_INPUT,
            Self::Backlight(_) => KEY_BACKLIGHT,
            Self::Volume(_) => KEY_VOLUME,
            Self::Htb(_) => KEY_HTB,
            Self::Triode(_) => KEY_TRIODE,
            Self::Gain(_) => KEY_GAIN,
        }
    }

    /// JSON value sent for the key
    pub fn wire_value(&self) -> Value {
        match *self {
            Self::Power(state) => json!(state == PowerState::On),
            Self::Mute(state) => json!(state == MuteState::Muted),
            Self::Htb(state) => json!(state == HtbState::Enabled),
            Self::Triode(on) => json!(u8::from(on)),
            Self::Input(v) | Self::Backlight(v) | Self::Volume(v) | Self::Gain(v) => json!(v),
        }
    }

    /// Full request body for `POST /api/control`
    pub fn wire_body(&self) -> Value {
        match self {
            Self::Power(_) => json!({ KEY_POWER: self.wire_value() }),
            _ => settings_body(self.key(), self.wire_value()),
        }
    }
}

/// `{"settings": {key: value}}`
pub fn settings_body(key: &str, value: Value) -> Value {
    let mut settings = serde_json::Map::new();
    settings.insert(key.to_string(), value);
    json!({ "settings": settings })
}
