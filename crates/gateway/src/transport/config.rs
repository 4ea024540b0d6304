//! Endpoint addresses

use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const TCP_SCHEME: &str = "tcp://";

/// A TCP endpoint, written either `tcp://host:port` or `host:port`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Loopback endpoint on an OS-assigned port
    pub fn ephemeral() -> Self {
        Self::new("127.0.0.1", 0)
    }

    pub fn parse(s: &str) -> Result<Self, TransportError> {
        s.parse()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` form accepted by tokio's bind/connect
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.trim();
        let rest = rest.strip_prefix(TCP_SCHEME).unwrap_or(rest);
        if rest.contains("://") {
            return Err(TransportError::Endpoint(format!(
                "unsupported scheme in '{}'",
                s
            )));
        }

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| TransportError::Endpoint(format!("missing port in '{}'", s)))?;
        if host.is_empty() {
            return Err(TransportError::Endpoint(format!("missing host in '{}'", s)));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| TransportError::Endpoint(format!("bad port in '{}': {}", s, e)))?;

        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = TransportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(value: Endpoint) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", TCP_SCHEME, self.host, self.port)
    }
}
