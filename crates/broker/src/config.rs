//! Configuration loading for the execution broker
//!
//! Sources, lowest precedence first: built-in defaults, a JSON file,
//! `PEDLAR_*` environment variables, command line flags.

use pedlar_gateway::Endpoint;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Runtime settings of `lbroker`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Upstream ticker to subscribe to
    #[serde(default = "default_ticker")]
    pub ticker: Endpoint,

    /// Address the request/reply endpoint binds to
    #[serde(default = "default_broker_host")]
    pub broker_host: Endpoint,

    /// First order id handed out; ids are never reused within a process
    #[serde(default = "default_order_id")]
    pub order_id: u64,

    /// Account leverage applied to profit
    #[serde(default = "default_leverage")]
    pub leverage: u32,

    /// Requests that may queue up in front of the broker
    #[serde(default = "default_request_queue")]
    pub request_queue: usize,

    /// How many feed updates a slow downstream consumer may lag
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,

    /// Delay before reconnecting to a lost ticker
    #[serde(default = "default_reconnect_ms")]
    pub reconnect_ms: u64,
}

fn default_ticker() -> Endpoint {
    Endpoint::new("127.0.0.1", 7000)
}

fn default_broker_host() -> Endpoint {
    Endpoint::new("127.0.0.1", 7100)
}

fn default_order_id() -> u64 {
    1
}

fn default_leverage() -> u32 {
    100
}

fn default_request_queue() -> usize {
    1024
}

fn default_feed_capacity() -> usize {
    1024
}

fn default_reconnect_ms() -> u64 {
    1000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            ticker: default_ticker(),
            broker_host: default_broker_host(),
            order_id: default_order_id(),
            leverage: default_leverage(),
            request_queue: default_request_queue(),
            feed_capacity: default_feed_capacity(),
            reconnect_ms: default_reconnect_ms(),
        }
    }
}

impl BrokerConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `PEDLAR_TICKER`, `PEDLAR_BROKER`, `PEDLAR_ORDER_ID` and `PEDLAR_LEVERAGE`
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("PEDLAR_TICKER") {
            self.ticker = parse_endpoint("PEDLAR_TICKER", &v)?;
        }
        if let Some(v) = lookup("PEDLAR_BROKER") {
            self.broker_host = parse_endpoint("PEDLAR_BROKER", &v)?;
        }
        if let Some(v) = lookup("PEDLAR_ORDER_ID") {
            self.order_id = parse_number("PEDLAR_ORDER_ID", &v)?;
        }
        if let Some(v) = lookup("PEDLAR_LEVERAGE") {
            self.leverage = parse_number("PEDLAR_LEVERAGE", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Zero is the "no order" id on the wire
        if self.order_id == 0 {
            return Err(ConfigError::Invalid("order_id must be at least 1".into()));
        }
        if self.leverage == 0 {
            return Err(ConfigError::Invalid("leverage must be at least 1".into()));
        }
        if self.request_queue == 0 || self.feed_capacity == 0 {
            return Err(ConfigError::Invalid(
                "request_queue and feed_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

pub fn parse_endpoint(name: &str, value: &str) -> Result<Endpoint, ConfigError> {
    Endpoint::parse(value).map_err(|e| ConfigError::Invalid(format!("{}: {}", name, e)))
}

pub fn parse_number<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{}: {}", name, e)))
}
