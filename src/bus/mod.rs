//! Event bus for inter-component communication
//!
//! Uses tokio::sync::broadcast for pub/sub pattern.
//! Events are typed and can carry payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Event types that can be published on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BusEvent {
    /// First successful poll, or first success after a failure
    AmpConnected { host: String },
    /// A poll failed after the previous one succeeded
    AmpUnavailable { host: String, error: String },

    /// A poll cycle published a new snapshot
    SnapshotUpdated {
        host: String,
        fetched_at: DateTime<Utc>,
    },
    /// A poll cycle failed; the previous snapshot stays published
    UpdateFailed { host: String, error: String },

    /// A control write was accepted by the amplifier
    ControlWritten {
        host: String,
        key: String,
        value: serde_json::Value,
    },

    ShuttingDown { reason: Option<String> },
}

/// Event bus handle for publishing and subscribing
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: BusEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    /// Default capacity (256 events)
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shared event bus wrapped in Arc for thread-safe sharing
pub type SharedBus = Arc<EventBus>;

/// Create a new shared event bus
pub fn create_bus() -> SharedBus {
    Arc::new(EventBus::default())
}
