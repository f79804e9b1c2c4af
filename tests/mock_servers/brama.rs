//! Mock Brama amplifier for testing
//!
//! Serves `GET /api/{status,settings,info}` and `POST /api/control`. Control
//! writes are applied to the served state the way the real firmware does, so a
//! write followed by a poll reads the new value back.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// How `POST /api/control` answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlReply {
    /// `{"result": "ok"}` as application/json
    Json,
    /// `{}` labelled text/plain, as some firmware versions do
    PlainText,
    /// 200 with no body
    Empty,
}

/// Mock amplifier state
struct MockBramaState {
    status: Map<String, Value>,
    settings: Map<String, Value>,
    info: Map<String, Value>,
    /// Endpoints forced to answer with an error status
    failures: HashMap<String, StatusCode>,
    /// Content type overrides for GET endpoints
    content_types: HashMap<String, String>,
    get_delay: Duration,
    control_reply: ControlReply,
    posted: Vec<Value>,
    get_counts: HashMap<String, usize>,
}

impl MockBramaState {
    fn section(&self, endpoint: &str) -> Option<&Map<String, Value>> {
        match endpoint {
            "status" => Some(&self.status),
            "settings" => Some(&self.settings),
            "info" => Some(&self.info),
            _ => None,
        }
    }
}

struct Shared {
    state: RwLock<MockBramaState>,
    active_gets: AtomicUsize,
    max_active_gets: AtomicUsize,
}

/// Mock Brama Server
pub struct MockBramaServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl MockBramaServer {
    /// Start a mock amplifier on a random port, powered on at volume 30
    pub async fn start() -> Self {
        let state = MockBramaState {
            status: object(json!({
                "amp_pwr": true,
                "ac": 23010,
                "temp_l": 3150,
                "temp_r": 3275
            })),
            settings: object(json!({
                "vol": 30,
                "src": 0,
                "led_lvl": 2,
                "gain": 1,
                "muted": false,
                "htb": false,
                "mix": 0
            })),
            info: object(json!({
                "model": "Brama",
                "fw": "2.1.0"
            })),
            failures: HashMap::new(),
            content_types: HashMap::new(),
            get_delay: Duration::ZERO,
            control_reply: ControlReply::Json,
            posted: Vec::new(),
            get_counts: HashMap::new(),
        };
        let shared = Arc::new(Shared {
            state: RwLock::new(state),
            active_gets: AtomicUsize::new(0),
            max_active_gets: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api/control", post(handle_control))
            .route("/api/{endpoint}", get(handle_get))
            .with_state(shared.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            shared,
            handle,
        }
    }

    /// Get the server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Host string for `BramaClient` (`127.0.0.1:port`)
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub async fn set_setting(&self, key: &str, value: Value) {
        let mut state = self.shared.state.write().await;
        state.settings.insert(key.to_string(), value);
    }

    pub async fn set_status(&self, key: &str, value: Value) {
        let mut state = self.shared.state.write().await;
        state.status.insert(key.to_string(), value);
    }

    /// Make an endpoint answer with `status` until cleared
    pub async fn fail_endpoint(&self, endpoint: &str, status: StatusCode) {
        let mut state = self.shared.state.write().await;
        state.failures.insert(endpoint.to_string(), status);
    }

    pub async fn clear_failures(&self) {
        let mut state = self.shared.state.write().await;
        state.failures.clear();
    }

    /// Serve a GET endpoint with a different content type
    pub async fn set_content_type(&self, endpoint: &str, content_type: &str) {
        let mut state = self.shared.state.write().await;
        state
            .content_types
            .insert(endpoint.to_string(), content_type.to_string());
    }

    /// Delay every GET by `delay`
    pub async fn set_get_delay(&self, delay: Duration) {
        let mut state = self.shared.state.write().await;
        state.get_delay = delay;
    }

    pub async fn set_control_reply(&self, reply: ControlReply) {
        let mut state = self.shared.state.write().await;
        state.control_reply = reply;
    }

    /// Bodies received on `POST /api/control`, oldest first
    pub async fn posted(&self) -> Vec<Value> {
        self.shared.state.read().await.posted.clone()
    }

    pub async fn get_count(&self, endpoint: &str) -> usize {
        let state = self.shared.state.read().await;
        state.get_counts.get(endpoint).copied().unwrap_or(0)
    }

    /// Highest number of GETs that were being served at the same time
    pub fn max_concurrent_gets(&self) -> usize {
        self.shared.max_active_gets.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub async fn stop(self) {
        self.handle.abort();
    }
}

/// Handle GET /api/{endpoint}
async fn handle_get(State(shared): State<Arc<Shared>>, Path(endpoint): Path<String>) -> Response {
    let active = shared.active_gets.fetch_add(1, Ordering::SeqCst) + 1;
    shared.max_active_gets.fetch_max(active, Ordering::SeqCst);

    let delay = {
        let mut state = shared.state.write().await;
        *state.get_counts.entry(endpoint.clone()).or_default() += 1;
        state.get_delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let response = {
        let state = shared.state.read().await;
        if let Some(status) = state.failures.get(&endpoint) {
            (*status, "firmware error").into_response()
        } else {
            match state.section(&endpoint) {
                Some(section) => {
                    let body = Value::Object(section.clone()).to_string();
                    let content_type = state
                        .content_types
                        .get(&endpoint)
                        .cloned()
                        .unwrap_or_else(|| "application/json".to_string());
                    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
                }
                None => StatusCode::NOT_FOUND.into_response(),
            }
        }
    };

    shared.active_gets.fetch_sub(1, Ordering::SeqCst);
    response
}

/// Handle POST /api/control
async fn handle_control(State(shared): State<Arc<Shared>>, Json(body): Json<Value>) -> Response {
    let mut state = shared.state.write().await;
    state.posted.push(body.clone());

    if let Some(status) = state.failures.get("control") {
        return (*status, "firmware error").into_response();
    }

    if let Some(power) = body.get("power") {
        state.status.insert("amp_pwr".to_string(), power.clone());
    }
    if let Some(Value::Object(settings)) = body.get("settings") {
        for (key, value) in settings {
            state.settings.insert(key.clone(), value.clone());
        }
    }

    match state.control_reply {
        ControlReply::Json => (StatusCode::OK, Json(json!({"result": "ok"}))).into_response(),
        ControlReply::PlainText => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            "{}",
        )
            .into_response(),
        ControlReply::Empty => StatusCode::OK.into_response(),
    }
}
