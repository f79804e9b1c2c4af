//! Brama Control
//!
//! Polls a Vinnie Rossi Brama amplifier over its local HTTP API and exposes
//! its controls as typed values.
//!
//! This library provides:
//! - An HTTP client for the amplifier's `status`/`settings`/`info`/`control` endpoints
//! - A single-flight poll coordinator publishing immutable snapshots
//! - Pure projections from a snapshot to control values, and a control table
//! - An adapter that performs writes and triggers refreshes
//! - Server-Sent Events for real-time updates (`server` feature)

pub mod adapters;
#[cfg(feature = "server")]
pub mod api;
pub mod bus;
pub mod client;
pub mod config;
pub mod controls;
pub mod coordinator;
pub mod projection;
pub mod snapshot;
