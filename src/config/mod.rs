//! Configuration management

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::client::DEFAULT_REQUEST_TIMEOUT;
use crate::coordinator::DEFAULT_POLL_INTERVAL;

const APP_DIR_NAME: &str = "brama-control";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub amp: Option<AmpConfig>,
}

fn default_port() -> u16 {
    8089
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmpConfig {
    /// IP address of the amplifier, optionally with `:port`
    pub host: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

impl AmpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Get config directory (BRAMA_CONFIG_DIR, XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> std::path::PathBuf {
    if let Ok(dir) = std::env::var("BRAMA_CONFIG_DIR") {
        return std::path::PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return std::path::PathBuf::from(home)
                .join("Library/Application Support")
                .join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return std::path::PathBuf::from(xdg).join(APP_DIR_NAME);
        }
        if let Ok(home) = std::env::var("HOME") {
            return std::path::PathBuf::from(home)
                .join(".config")
                .join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return std::path::PathBuf::from(appdata).join(APP_DIR_NAME);
        }
    }

    // Fallback to current directory
    std::path::PathBuf::from(".")
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let mut builder = ::config::Config::builder()
        // Start with defaults
        .set_default("port", default_port() as i64)?
        // Load from config file if it exists (config.toml / config.json / config.yaml)
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (BRAMA_PORT, BRAMA_AMP__HOST, etc.)
        .add_source(
            ::config::Environment::with_prefix("BRAMA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    // Port precedence: BRAMA_PORT > PORT > config > default
    if let Ok(port) = std::env::var("BRAMA_PORT") {
        if let Ok(port_num) = port.parse::<u16>() {
            builder = builder.set_override("port", port_num as i64)?;
        }
    } else if let Ok(port) = std::env::var("PORT") {
        // Container platforms hand the listen port over in PORT
        if let Ok(port_num) = port.parse::<u16>() {
            builder = builder.set_override("port", port_num as i64)?;
        }
    }

    // Shortcut for the single most common setting
    if let Ok(host) = std::env::var("BRAMA_HOST") {
        builder = builder.set_override("amp.host", host)?;
    }

    let config = builder.build()?;

    Ok(config.try_deserialize()?)
}
