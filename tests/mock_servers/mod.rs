//! Mock servers for integration testing
//!
//! Simulates the Brama amplifier's HTTP API so the client, coordinator and
//! adapter can be tested end to end without hardware.

#![allow(dead_code, unused_imports)]

pub mod brama;

pub use brama::{ControlReply, MockBramaServer};
