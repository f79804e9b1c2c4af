//! Device adapters

pub mod brama;
mod traits;

pub use brama::{BramaAdapter, BramaStatus, ControlError, DeviceInfo};
pub use traits::Startable;
