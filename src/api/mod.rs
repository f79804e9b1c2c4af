//! HTTP API handlers

use crate::adapters::{BramaAdapter, BramaStatus, ControlError, DeviceInfo};
use crate::bus::SharedBus;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub amp: Arc<BramaAdapter>,
    pub bus: SharedBus,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(amp: Arc<BramaAdapter>, bus: SharedBus) -> Self {
        Self {
            amp,
            bus,
            started_at: Instant::now(),
        }
    }
}

/// All API routes; middleware is added by the caller
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        // Amplifier routes
        .route("/amp/snapshot", get(snapshot_handler))
        .route("/amp/controls", get(controls_handler))
        .route("/amp/controls/{key}", get(control_handler))
        .route("/amp/switch", post(switch_handler))
        .route("/amp/select", post(select_handler))
        .route("/amp/number", post(number_handler))
        .route("/amp/refresh", post(refresh_handler))
        // Event stream (SSE)
        .route("/events", get(events_handler))
        .with_state(state)
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn control_error_response(e: ControlError) -> Response {
    let status = match e {
        ControlError::UnknownControl(_) => StatusCode::NOT_FOUND,
        ControlError::UnsupportedOperation { .. }
        | ControlError::InvalidOption { .. }
        | ControlError::InvalidValue { .. } => StatusCode::BAD_REQUEST,
        // The amplifier, not this service, failed the request
        ControlError::Client(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, e)
}

fn no_snapshot_yet() -> Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "No data from the amplifier yet",
    )
}

fn write_result(result: Result<(), ControlError>) -> Response {
    match result {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))).into_response(),
        Err(e) => control_error_response(e),
    }
}

/// General status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub git_sha: &'static str,
    pub uptime_secs: u64,
    pub device: DeviceInfo,
    pub amp: BramaStatus,
    pub bus_subscribers: usize,
}

/// GET /status - Service health check
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: "brama-control",
        version: env!("BRAMA_VERSION"),
        git_sha: env!("BRAMA_GIT_SHA"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        device: state.amp.device_info(),
        amp: state.amp.status().await,
        bus_subscribers: state.bus.subscriber_count(),
    })
}

// =============================================================================
// Amplifier handlers
// =============================================================================

/// GET /amp/snapshot - Raw data from the last successful poll
pub async fn snapshot_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.amp.snapshot() {
        Some(snapshot) => (StatusCode::OK, Json(snapshot.as_ref().clone())).into_response(),
        None => no_snapshot_yet(),
    }
}

/// GET /amp/controls - Every control with its current value
pub async fn controls_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.amp.controls() {
        Some(controls) => (StatusCode::OK, Json(controls)).into_response(),
        None => no_snapshot_yet(),
    }
}

/// GET /amp/controls/{key} - One control
pub async fn control_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match state.amp.control(&key) {
        Ok(Some(view)) => (StatusCode::OK, Json(view)).into_response(),
        Ok(None) => no_snapshot_yet(),
        Err(e) => control_error_response(e),
    }
}

#[derive(Deserialize)]
pub struct SwitchRequest {
    pub key: String,
    pub on: bool,
}

/// POST /amp/switch - Turn a switch control on or off
pub async fn switch_handler(
    State(state): State<AppState>,
    Json(req): Json<SwitchRequest>,
) -> impl IntoResponse {
    write_result(state.amp.set_switch(&req.key, req.on).await)
}

#[derive(Deserialize)]
pub struct SelectRequest {
    pub key: String,
    pub option: String,
}

/// POST /amp/select - Choose an option by label
pub async fn select_handler(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> impl IntoResponse {
    write_result(state.amp.select_option(&req.key, &req.option).await)
}

#[derive(Deserialize)]
pub struct NumberRequest {
    pub key: String,
    pub value: f64,
}

/// POST /amp/number - Set a numeric control
pub async fn number_handler(
    State(state): State<AppState>,
    Json(req): Json<NumberRequest>,
) -> impl IntoResponse {
    write_result(state.amp.set_number(&req.key, req.value).await)
}

/// POST /amp/refresh - Ask for a poll soon; returns immediately
pub async fn refresh_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.amp.request_refresh();
    (StatusCode::ACCEPTED, Json(serde_json::json!({"ok": true})))
}

// =============================================================================
// Event stream
// =============================================================================

/// GET /events - SSE stream of bus events
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.bus.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => serde_json::to_string(&event)
            .ok()
            .map(|json| Ok(Event::default().data(json))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
