//! Error types for amplifier API calls

use thiserror::Error;

/// Result type alias for device client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised at the device client boundary.
///
/// Callers above the client (the poll coordinator, the adapter) do not branch
/// on the variant; it exists so logs and the probe CLI can tell a dead network
/// apart from a device that answered with something unexpected.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Timeout, DNS failure, refused connection or a transport error while
    /// the request or body was in flight
    #[error("Error communicating with amplifier: {0}")]
    Communication(String),

    /// The device answered, but not with what we expected
    #[error("Unexpected response from amplifier: {0}")]
    Protocol(String),

    /// Host or endpoint that cannot form a request URL
    #[error("Invalid amplifier endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

impl ClientError {
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Communication(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Communication(format!("Timeout error fetching information - {}", e))
        } else if e.is_connect() || e.is_request() || e.is_body() {
            Self::Communication(format!("Error fetching information - {}", e))
        } else if e.is_status() || e.is_decode() {
            Self::Protocol(e.to_string())
        } else {
            Self::Protocol(format!("Something really wrong happened! - {}", e))
        }
    }
}
