//! Brama amplifier adapter
//!
//! Owns the HTTP client and the poll coordinator for one amplifier and
//! implements the entity write path: validate against the control table, send
//! the command, then ask the coordinator for a refresh. The write never edits
//! the published snapshot itself; the new value shows up once the device
//! reports it.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bus::{BusEvent, SharedBus};
use crate::client::{BramaClient, ClientError, ControlCommand};
use crate::config::AmpConfig;
use crate::controls::{self, ControlDescription, ControlKind, ControlView};
use crate::coordinator::{CoordinatorState, PollCoordinator};
use crate::snapshot::Snapshot;

pub const MANUFACTURER: &str = "Vinnie Rossi";
pub const MODEL: &str = "Brama";

/// Why an entity write was rejected or failed
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Unknown control: {0}")]
    UnknownControl(String),

    #[error("Control {key} does not support {operation}")]
    UnsupportedOperation {
        key: String,
        operation: &'static str,
    },

    #[error("{option:?} is not an option of {key}")]
    InvalidOption { key: String, option: String },

    #[error("{value} is outside {min}..={max} for {key}")]
    InvalidValue {
        key: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Device identification shown to users
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct BramaStatus {
    pub host: String,
    pub running: bool,
    /// Last poll cycle succeeded
    pub available: bool,
    pub state: CoordinatorState,
    pub last_error: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub poll_interval_secs: u64,
}

#[derive(Default)]
struct AdapterState {
    running: bool,
    /// Cancels the poll loop of the current start; replaced on every start
    shutdown: Option<CancellationToken>,
}

#[derive(Clone)]
pub struct BramaAdapter {
    client: BramaClient,
    coordinator: Arc<PollCoordinator>,
    bus: SharedBus,
    state: Arc<RwLock<AdapterState>>,
}

impl BramaAdapter {
    pub fn new(config: &AmpConfig, bus: SharedBus) -> Result<Self, ClientError> {
        let client = BramaClient::with_timeout(config.host.clone(), config.request_timeout())?;
        let coordinator = PollCoordinator::new(Arc::new(client.clone()), bus.clone())
            .with_interval(config.poll_interval());

        Ok(Self {
            client,
            coordinator: Arc::new(coordinator),
            bus,
            state: Arc::new(RwLock::new(AdapterState::default())),
        })
    }

    pub fn host(&self) -> &str {
        self.client.host()
    }

    pub fn coordinator(&self) -> &Arc<PollCoordinator> {
        &self.coordinator
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("Brama ({})", self.host()),
            manufacturer: MANUFACTURER,
            model: MODEL,
        }
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.coordinator.snapshot()
    }

    /// Every control with its current value, or `None` before the first poll
    pub fn controls(&self) -> Option<Vec<ControlView>> {
        self.snapshot().map(|s| controls::project_all(&s))
    }

    /// One control with its current value, or `Ok(None)` before the first poll
    pub fn control(&self, key: &str) -> Result<Option<ControlView>, ControlError> {
        let description = describe(key)?;
        Ok(self
            .snapshot()
            .map(|s| ControlView::new(description, &s)))
    }

    pub fn request_refresh(&self) {
        self.coordinator.request_refresh();
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.running
    }

    pub async fn status(&self) -> BramaStatus {
        BramaStatus {
            host: self.host().to_string(),
            running: self.is_running().await,
            available: self.coordinator.last_update_success().await,
            state: self.coordinator.state(),
            last_error: self.coordinator.last_error().await.map(|e| e.to_string()),
            last_update: self.snapshot().map(|s| s.fetched_at),
            poll_interval_secs: self.coordinator.interval().as_secs(),
        }
    }

    // =========================================================================
    // Entity writes
    // =========================================================================

    pub async fn turn_on(&self, key: &str) -> Result<(), ControlError> {
        self.set_switch(key, true).await
    }

    pub async fn turn_off(&self, key: &str) -> Result<(), ControlError> {
        self.set_switch(key, false).await
    }

    pub async fn set_switch(&self, key: &str, on: bool) -> Result<(), ControlError> {
        let description = describe(key)?;
        let ControlKind::Switch { write, .. } = description.kind else {
            return Err(unsupported(description, "switching"));
        };
        self.write(write(on)).await
    }

    /// Select by option label, e.g. `("input_selector", "Input 3")`
    pub async fn select_option(&self, key: &str, option: &str) -> Result<(), ControlError> {
        let description = describe(key)?;
        let ControlKind::Select { write, .. } = description.kind else {
            return Err(unsupported(description, "option selection"));
        };
        let command = write(option).ok_or_else(|| ControlError::InvalidOption {
            key: key.to_string(),
            option: option.to_string(),
        })?;
        self.write(command).await
    }

    pub async fn set_number(&self, key: &str, value: f64) -> Result<(), ControlError> {
        let description = describe(key)?;
        let ControlKind::Number { min, max, write, .. } = description.kind else {
            return Err(unsupported(description, "numeric values"));
        };
        if !value.is_finite() || value < min || value > max {
            return Err(ControlError::InvalidValue {
                key: key.to_string(),
                value,
                min,
                max,
            });
        }
        self.write(write(value.round() as u8)).await
    }

    async fn write(&self, command: ControlCommand) -> Result<(), ControlError> {
        if let Err(e) = self.client.send(command).await {
            warn!("Write of {} to {} failed: {}", command.key(), self.host(), e);
            return Err(e.into());
        }

        self.bus.publish(BusEvent::ControlWritten {
            host: self.host().to_string(),
            key: command.key().to_string(),
            value: command.wire_value(),
        });
        self.coordinator.request_refresh();
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    async fn start_internal(&self) -> Result<()> {
        // Check and set atomically so concurrent starts spawn one loop. The
        // token is created here so a stop() during the first refresh cancels it.
        let shutdown = {
            let mut state = self.state.write().await;
            if state.running {
                return Ok(());
            }
            if let Some(previous) = state.shutdown.take() {
                previous.cancel();
            }
            let token = CancellationToken::new();
            state.shutdown = Some(token.clone());
            state.running = true;
            token
        };

        if let Err(e) = self.coordinator.first_refresh().await {
            let mut state = self.state.write().await;
            // A cancelled token means stop() already reset the state
            if !shutdown.is_cancelled() {
                shutdown.cancel();
                state.shutdown = None;
                state.running = false;
            }
            return Err(e.into());
        }

        if shutdown.is_cancelled() {
            info!("Brama adapter for {} stopped during start", self.host());
            return Ok(());
        }

        let coordinator = self.coordinator.clone();
        tokio::spawn(async move { coordinator.run(shutdown).await });

        info!("Brama adapter started for {}", self.host());
        Ok(())
    }

    async fn stop_internal(&self) {
        let was_running = {
            let mut state = self.state.write().await;
            if let Some(token) = state.shutdown.take() {
                token.cancel();
            }
            std::mem::replace(&mut state.running, false)
        };

        if was_running {
            info!("Brama adapter stopped for {}", self.host());
        }
    }

    /// Time between scheduled polls
    pub fn poll_interval(&self) -> Duration {
        self.coordinator.interval()
    }
}

crate::impl_startable!(BramaAdapter, "brama");

fn describe(key: &str) -> Result<&'static ControlDescription, ControlError> {
    controls::lookup(key).ok_or_else(|| ControlError::UnknownControl(key.to_string()))
}

fn unsupported(description: &ControlDescription, operation: &'static str) -> ControlError {
    ControlError::UnsupportedOperation {
        key: description.key.to_string(),
        operation,
    }
}
