//! Configuration for the web boundary
//!
//! Defaults, then an optional JSON file, then environment variables:
//! `HOST`, `PORT`, `BROKER_URL`, `TICKER_URL`, `RELAY_URL`, `BROKER_TIMEOUT_MS`.

use pedlar_gateway::Endpoint;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// HTTP bind host
    pub host: String,
    /// HTTP bind port
    pub port: u16,
    /// Execution broker request/reply endpoint
    pub broker: Endpoint,
    /// Upstream ticker
    pub ticker: Endpoint,
    /// Where agents subscribe to the relayed feed
    pub relay: Endpoint,
    /// How long to wait for a broker response
    pub broker_timeout_ms: u64,
    /// Linger on broker connection close; `None` keeps the OS default
    pub linger_ms: Option<u64>,
    /// Updates a slow relay subscriber may lag before skipping
    pub relay_capacity: usize,
    /// Delay before reconnecting to a lost ticker
    pub reconnect_ms: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            broker: Endpoint::new("127.0.0.1", 7100),
            ticker: Endpoint::new("127.0.0.1", 7000),
            relay: Endpoint::new("127.0.0.1", 7010),
            broker_timeout_ms: 500,
            linger_ms: Some(0),
            relay_capacity: 1024,
            reconnect_ms: 1000,
        }
    }
}

impl WebConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = parse("PORT", &port)?;
        }
        if let Some(url) = lookup("BROKER_URL") {
            self.broker = endpoint("BROKER_URL", &url)?;
        }
        if let Some(url) = lookup("TICKER_URL") {
            self.ticker = endpoint("TICKER_URL", &url)?;
        }
        if let Some(url) = lookup("RELAY_URL") {
            self.relay = endpoint("RELAY_URL", &url)?;
        }
        if let Some(ms) = lookup("BROKER_TIMEOUT_MS") {
            self.broker_timeout_ms = parse("BROKER_TIMEOUT_MS", &ms)?;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn broker_timeout(&self) -> Duration {
        Duration::from_millis(self.broker_timeout_ms)
    }

    pub fn linger(&self) -> Option<Duration> {
        self.linger_ms.map(Duration::from_millis)
    }

    pub fn reconnect(&self) -> Duration {
        Duration::from_millis(self.reconnect_ms)
    }
}

fn endpoint(name: &str, value: &str) -> Result<Endpoint, ConfigError> {
    Endpoint::parse(value).map_err(|e| ConfigError::Invalid {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn parse<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
