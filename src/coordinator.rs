//! PollCoordinator - single-flight polling cache for one amplifier
//!
//! Every cycle reads `status`, `settings` and `info` in that order and, only if
//! all three succeed, publishes them together as one [`Snapshot`]. A failed
//! cycle publishes nothing; readers keep seeing the last good snapshot.
//!
//! ```text
//!            tick / request_refresh()
//!   Idle ───────────────────────────▶ Fetching ──ok──▶ Ready ──┐
//!     ▲                                   │                     │
//!     │                                   └──err─▶ Failed ──────┤
//!     └─────────────────── next tick ◀──────────────────────────┘
//! ```
//!
//! `Ready` and `Failed` are the idle states, annotated with how the last cycle
//! went. At most one cycle runs at any instant: `refresh()` serializes on an
//! in-flight guard, and `request_refresh()` only leaves a wake-up permit for
//! the scheduled loop, so any number of requests made while a cycle is running
//! collapse into one follow-up cycle.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex, Notify, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{BusEvent, SharedBus};
use crate::client::{BramaClient, ClientError, ENDPOINT_INFO, ENDPOINT_SETTINGS, ENDPOINT_STATUS};
use crate::snapshot::Snapshot;

/// Time between scheduled polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Read side of the device API, as used by the coordinator
#[async_trait]
pub trait DeviceReader: Send + Sync + 'static {
    /// Host identifier for logs and events
    fn host(&self) -> &str;

    /// GET one endpoint and return its decoded body
    async fn get(&self, endpoint: &str) -> Result<Value, ClientError>;
}

#[async_trait]
impl DeviceReader for BramaClient {
    fn host(&self) -> &str {
        BramaClient::host(self)
    }

    async fn get(&self, endpoint: &str) -> Result<Value, ClientError> {
        BramaClient::get(self, endpoint).await
    }
}

/// Where the coordinator is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinatorState {
    /// No cycle has run yet
    Idle,
    Fetching,
    /// Last cycle published a snapshot
    Ready,
    /// Last cycle failed; the previous snapshot (if any) is still published
    Failed,
}

/// A poll cycle failed. The cause is flattened to text; callers above the
/// coordinator only need to know the cycle did not produce data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Error fetching amplifier data: {0}")]
pub struct UpdateFailed(pub String);

impl From<ClientError> for UpdateFailed {
    fn from(e: ClientError) -> Self {
        Self(e.to_string())
    }
}

/// The first poll at startup failed. The amplifier is not considered set up.
#[derive(Debug, Clone, Error)]
#[error("Amplifier at {host} did not answer the first poll: {source}")]
pub struct SetupError {
    pub host: String,
    #[source]
    pub source: UpdateFailed,
}

#[derive(Debug, Default)]
struct Health {
    /// None until the first cycle completes
    available: Option<bool>,
    last_error: Option<UpdateFailed>,
}

pub struct PollCoordinator {
    reader: Arc<dyn DeviceReader>,
    bus: SharedBus,
    interval: Duration,
    /// Held for the whole duration of a cycle
    in_flight: Mutex<()>,
    refresh_requested: Notify,
    snapshot: watch::Sender<Option<Arc<Snapshot>>>,
    state: watch::Sender<CoordinatorState>,
    health: RwLock<Health>,
}

impl PollCoordinator {
    pub fn new(reader: Arc<dyn DeviceReader>, bus: SharedBus) -> Self {
        let (snapshot, _) = watch::channel(None);
        let (state, _) = watch::channel(CoordinatorState::Idle);
        Self {
            reader,
            bus,
            interval: DEFAULT_POLL_INTERVAL,
            in_flight: Mutex::new(()),
            refresh_requested: Notify::new(),
            snapshot,
            state,
            health: RwLock::new(Health::default()),
        }
    }

    /// Override the scheduled poll interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn host(&self) -> &str {
        self.reader.host()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.borrow().clone()
    }

    /// Receiver that wakes whenever a new snapshot is published
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.snapshot.subscribe()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    /// Whether the most recent cycle succeeded (false before the first one)
    pub async fn last_update_success(&self) -> bool {
        self.health.read().await.available == Some(true)
    }

    pub async fn last_error(&self) -> Option<UpdateFailed> {
        self.health.read().await.last_error.clone()
    }

    /// Setup-time poll. Failure here is fatal for setup, not a degraded state.
    pub async fn first_refresh(&self) -> Result<Arc<Snapshot>, SetupError> {
        self.refresh().await.map_err(|source| {
            error!("First poll of amplifier at {} failed: {}", self.host(), source);
            SetupError {
                host: self.host().to_string(),
                source,
            }
        })
    }

    /// Run one cycle now and wait for its outcome.
    ///
    /// Waits for any cycle already in flight to finish first.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, UpdateFailed> {
        let in_flight = self.in_flight.lock().await;
        let result = self.run_cycle().await;
        drop(in_flight);
        result
    }

    /// Ask the scheduled loop for a cycle as soon as possible.
    ///
    /// Never blocks. Requests made before the loop picks up the previous one
    /// are merged. Nothing happens until [`run`](Self::run) is being driven.
    pub fn request_refresh(&self) {
        debug!("Refresh requested for {}", self.host());
        self.refresh_requested.notify_one();
    }

    /// Scheduled polling loop. Returns when `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut poll_timer = interval_at(Instant::now() + self.interval, self.interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Polling amplifier at {} every {:?}",
            self.host(),
            self.interval
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Polling of {} shutting down", self.host());
                    break;
                }
                _ = self.refresh_requested.notified() => {
                    debug!("Servicing requested refresh for {}", self.host());
                }
                _ = poll_timer.tick() => {}
            }

            // Failures are logged and published inside the cycle
            let _ = self.refresh().await;
            // Next scheduled poll is a full interval after this cycle
            poll_timer.reset();
        }
    }

    async fn run_cycle(&self) -> Result<Arc<Snapshot>, UpdateFailed> {
        self.state.send_replace(CoordinatorState::Fetching);

        match self.fetch_snapshot().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.snapshot.send_replace(Some(snapshot.clone()));
                self.state.send_replace(CoordinatorState::Ready);
                self.record_success().await;
                self.bus.publish(BusEvent::SnapshotUpdated {
                    host: self.host().to_string(),
                    fetched_at: snapshot.fetched_at,
                });
                Ok(snapshot)
            }
            Err(e) => {
                let failure = UpdateFailed::from(e);
                self.state.send_replace(CoordinatorState::Failed);
                self.record_failure(&failure).await;
                self.bus.publish(BusEvent::UpdateFailed {
                    host: self.host().to_string(),
                    error: failure.to_string(),
                });
                Err(failure)
            }
        }
    }

    /// One read of each endpoint, in order. Stops at the first failure.
    async fn fetch_snapshot(&self) -> Result<Snapshot, ClientError> {
        let status = self.reader.get(ENDPOINT_STATUS).await?;
        let settings = self.reader.get(ENDPOINT_SETTINGS).await?;
        let info = self.reader.get(ENDPOINT_INFO).await?;
        Snapshot::from_responses(status, settings, info)
    }

    async fn record_success(&self) {
        let previous = {
            let mut health = self.health.write().await;
            health.last_error = None;
            health.available.replace(true)
        };

        match previous {
            Some(true) => debug!("Fetched amplifier data from {}", self.host()),
            Some(false) => {
                info!("Amplifier at {} is back online", self.host());
                self.bus.publish(BusEvent::AmpConnected {
                    host: self.host().to_string(),
                });
            }
            None => {
                info!("Connected to amplifier at {}", self.host());
                self.bus.publish(BusEvent::AmpConnected {
                    host: self.host().to_string(),
                });
            }
        }
    }

    async fn record_failure(&self, failure: &UpdateFailed) {
        let previous = {
            let mut health = self.health.write().await;
            health.last_error = Some(failure.clone());
            health.available.replace(false)
        };

        match previous {
            Some(false) => debug!("Amplifier at {} still unavailable: {}", self.host(), failure),
            Some(true) => {
                warn!("Amplifier at {} is unavailable: {}", self.host(), failure);
                self.bus.publish(BusEvent::AmpUnavailable {
                    host: self.host().to_string(),
                    error: failure.to_string(),
                });
            }
            None => warn!("Amplifier at {} did not answer: {}", self.host(), failure),
        }
    }
}
