//! Brama amplifier HTTP client
//!
//! Talks to the amplifier's local REST API at `http://{host}/api/`:
//!
//! - `GET /api/status`   - power, AC line voltage, output stage temperatures
//! - `GET /api/settings` - volume, input, gain, backlight, mute, HTB, triode mix
//! - `GET /api/info`     - device identification
//! - `POST /api/control` - writes (see [`ControlCommand`])
//!
//! Every request is bounded by a fixed deadline (10s unless configured
//! otherwise). GET responses must be `application/json`; POST responses are
//! accepted with any content type because the firmware does not label them
//! consistently.

mod command;
mod error;

pub use command::{
    settings_body, ControlCommand, HtbState, MuteState, PowerState, KEY_BACKLIGHT, KEY_GAIN,
    KEY_HTB, KEY_INPUT, KEY_MUTED, KEY_POWER, KEY_TRIODE, KEY_VOLUME,
};
pub use error::{ClientError, Result};

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a power write so the device latches the new state before the
/// next poll reads it back
pub const POWER_LATCH_DELAY: Duration = Duration::from_millis(5);

pub const ENDPOINT_STATUS: &str = "status";
pub const ENDPOINT_SETTINGS: &str = "settings";
pub const ENDPOINT_INFO: &str = "info";
pub const ENDPOINT_CONTROL: &str = "control";

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Client for one amplifier. Cheap to clone; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct BramaClient {
    host: String,
    base_url: Url,
    client: Client,
    timeout: Duration,
}

impl BramaClient {
    /// Client for the amplifier at `host` (an IP address, optionally with a port)
    pub fn new(host: impl Into<String>) -> Result<Self> {
        Self::with_timeout(host, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(host: impl Into<String>, timeout: Duration) -> Result<Self> {
        let host = host.into();
        let base_url = Url::parse(&format!("http://{}/api/", host))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Protocol(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            host,
            base_url,
            client,
            timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.base_url.join(endpoint)?)
    }

    /// GET `{base}/{endpoint}` and decode the JSON body
    pub async fn get(&self, endpoint: &str) -> Result<Value> {
        self.request(Method::GET, endpoint, None).await
    }

    /// POST a JSON body to `{base}/{endpoint}` and decode whatever comes back
    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, endpoint, Some(body)).await
    }

    pub async fn get_status(&self) -> Result<Value> {
        self.get(ENDPOINT_STATUS).await
    }

    pub async fn get_settings(&self) -> Result<Value> {
        self.get(ENDPOINT_SETTINGS).await
    }

    pub async fn get_info(&self) -> Result<Value> {
        self.get(ENDPOINT_INFO).await
    }

    /// Write a single settings key: `{"settings": {key: value}}`
    pub async fn set_control(&self, key: &str, value: Value) -> Result<Value> {
        self.post(ENDPOINT_CONTROL, &settings_body(key, value)).await
    }

    /// Send a typed command to the control endpoint
    pub async fn send(&self, command: ControlCommand) -> Result<Value> {
        let response = self.post(ENDPOINT_CONTROL, &command.wire_body()).await?;
        if let ControlCommand::Power(_) = command {
            // TODO: replace with a confirming poll of status.amp_pwr once the
            // firmware's latch time is characterized
            tokio::time::sleep(POWER_LATCH_DELAY).await;
        }
        Ok(response)
    }

    pub async fn set_power(&self, state: PowerState) -> Result<()> {
        self.send(ControlCommand::Power(state)).await.map(|_| ())
    }

    pub async fn set_mute(&self, state: MuteState) -> Result<Value> {
        self.send(ControlCommand::Mute(state)).await
    }

    pub async fn set_input(&self, index: u8) -> Result<Value> {
        self.send(ControlCommand::Input(index)).await
    }

    pub async fn set_backlight(&self, level: u8) -> Result<Value> {
        self.send(ControlCommand::Backlight(level)).await
    }

    pub async fn set_volume(&self, volume: u8) -> Result<Value> {
        self.send(ControlCommand::Volume(volume)).await
    }

    pub async fn set_htb(&self, state: HtbState) -> Result<Value> {
        self.send(ControlCommand::Htb(state)).await
    }

    pub async fn set_triode(&self, on: bool) -> Result<Value> {
        self.send(ControlCommand::Triode(on)).await
    }

    pub async fn set_gain(&self, level: u8) -> Result<Value> {
        self.send(ControlCommand::Gain(level)).await
    }

    async fn request(&self, method: Method, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        let url = self.endpoint_url(endpoint)?;
        let strict_json = method == Method::GET;

        debug!(method = %method, url = %url, body = ?body, "Amplifier request");

        let mut request = self.client.request(method, url.clone());
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, JSON_CONTENT_TYPE).json(body);
        }

        // reqwest applies the same deadline, the outer one also covers the body read
        let data = tokio::time::timeout(self.timeout, async {
            let response = request.send().await?;
            decode_response(response, strict_json).await
        })
        .await
        .map_err(|_| {
            ClientError::Communication(format!(
                "Timeout error fetching information - no response from {} within {:?}",
                url, self.timeout
            ))
        })??;

        debug!(url = %url, response = ?data, "Amplifier response");
        Ok(data)
    }
}

/// Check status and content type, then decode the body.
///
/// An empty body decodes to `null`.
async fn decode_response(response: Response, strict_json: bool) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Protocol(format!(
            "{} returned {}",
            response.url(),
            status
        )));
    }

    if strict_json {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !is_json_content_type(content_type) {
            return Err(ClientError::Protocol(format!(
                "Attempt to decode JSON with unexpected mimetype: {:?}",
                content_type
            )));
        }
    }

    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&text)
        .map_err(|e| ClientError::Protocol(format!("Invalid JSON in response: {}", e)))
}

/// Media type check that ignores parameters such as `charset`
fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}
