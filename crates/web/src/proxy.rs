//! Caller side of the execution broker
//!
//! [`BrokerProxy`] validates a decoded trade command, runs one request/reply
//! exchange under a timeout and sorts the outcome into [`ProxyError`].
//!
//! A request that times out may still have been applied by the broker. The
//! proxy reports [`ProxyError::Timeout`] and never retries; the caller has to
//! treat the outcome as unknown. The connection that timed out is dropped, so
//! a late reply can never be read as the answer to a later request.

use async_trait::async_trait;
use pedlar_core::{OrderId, TradeAction, TradeRequest, TradeResponse};
use pedlar_gateway::{Endpoint, Requester, TcpRequester, TransportError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

pub const MIN_VOLUME: f64 = 0.01;
pub const MAX_VOLUME: f64 = 1.0;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("invalid trade request: {0}")]
    InvalidRequest(String),

    /// Outcome unknown: the broker may or may not have applied the request
    #[error("no broker response within {0:?}")]
    Timeout(Duration),

    #[error("broker rejected order {order_id} with retcode {retcode}")]
    Rejected { order_id: OrderId, retcode: u32 },

    #[error("broker protocol violation: {0}")]
    Protocol(String),

    #[error("broker unavailable: {0}")]
    Transport(#[from] TransportError),
}

/// Trade command as decoded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeCommand {
    #[serde(default)]
    pub order_id: i64,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub action: i64,
    /// Agent name, only used for logging
    #[serde(default)]
    pub name: Option<String>,
}

fn default_volume() -> f64 {
    MIN_VOLUME
}

impl TradeCommand {
    pub fn new(order_id: i64, volume: f64, action: i64) -> Self {
        Self {
            order_id,
            volume,
            action,
            name: None,
        }
    }

    /// Check the shape and convert to a wire request. Action 0 passes here
    /// even though the broker will refuse it.
    pub fn validate(&self) -> Result<TradeRequest, ProxyError> {
        let order_id = u64::try_from(self.order_id).map_err(|_| {
            ProxyError::InvalidRequest(format!("order_id {} is negative", self.order_id))
        })?;
        if !(MIN_VOLUME..=MAX_VOLUME).contains(&self.volume) {
            return Err(ProxyError::InvalidRequest(format!(
                "volume {} outside [{}, {}]",
                self.volume, MIN_VOLUME, MAX_VOLUME
            )));
        }
        let action = match self.action {
            0..=3 => TradeAction::from(self.action as u8),
            other => {
                return Err(ProxyError::InvalidRequest(format!(
                    "unknown action {}",
                    other
                )));
            }
        };
        Ok(TradeRequest::new(order_id, self.volume, action))
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Opens connections to the broker
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    type Conn: Requester<TradeRequest, TradeResponse> + 'static;

    async fn connect(&self) -> Result<Self::Conn, TransportError>;
}

/// Connects over TCP
pub struct TcpConnector {
    endpoint: Endpoint,
    linger: Option<Duration>,
}

impl TcpConnector {
    pub fn new(endpoint: Endpoint, linger: Option<Duration>) -> Self {
        Self { endpoint, linger }
    }
}

#[async_trait]
impl Connect for TcpConnector {
    type Conn = TcpRequester<TradeRequest, TradeResponse>;

    async fn connect(&self) -> Result<Self::Conn, TransportError> {
        info!("Connecting to broker: {}", self.endpoint);
        TcpRequester::connect(&self.endpoint, self.linger).await
    }
}

pub struct BrokerProxy<C: Connect> {
    connector: C,
    timeout: Duration,
    /// Idle connection; empty while in use or after a timeout or transport failure
    conn: Mutex<Option<C::Conn>>,
}

impl<C: Connect> BrokerProxy<C> {
    pub fn new(connector: C, timeout: Duration) -> Self {
        Self {
            connector,
            timeout,
            conn: Mutex::new(None),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn validate(&self, command: &TradeCommand) -> Result<TradeRequest, ProxyError> {
        command.validate()
    }

    /// One request/reply round trip, bounded by the timeout
    ///
    /// The cached connection is taken out of its slot for the exchange. A
    /// caller that finds the slot empty opens its own connection instead of
    /// waiting, so concurrent calls never queue behind each other.
    pub async fn exchange(&self, request: &TradeRequest) -> Result<TradeResponse, ProxyError> {
        let deadline = Instant::now() + self.timeout;

        let cached = self.conn.lock().await.take();
        let conn = match cached {
            Some(conn) => conn,
            None => match timeout_at(deadline, self.connector.connect()).await {
                Ok(conn) => conn?,
                Err(_) => return Err(ProxyError::Transport(TransportError::Timeout)),
            },
        };

        match timeout_at(deadline, conn.request(request)).await {
            Ok(Ok(response)) => {
                let mut slot = self.conn.lock().await;
                if slot.is_none() {
                    *slot = Some(conn);
                }
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!("Broker exchange failed, dropping connection: {}", e);
                Err(ProxyError::Transport(e))
            }
            Err(_) => {
                warn!(
                    "Broker did not answer {} for order {} within {:?}, dropping connection",
                    request.action.as_str(),
                    request.order_id,
                    self.timeout
                );
                Err(ProxyError::Timeout(self.timeout))
            }
        }
    }

    /// Validate, exchange and check the response shape
    pub async fn handle(&self, command: &TradeCommand) -> Result<TradeResponse, ProxyError> {
        let request = self.validate(command)?;
        let response = self.exchange(&request).await?;
        debug!("{:?} -> {:?}", request, response);

        if !response.is_ok() {
            return Err(ProxyError::Rejected {
                order_id: response.order_id,
                retcode: response.retcode,
            });
        }
        if request.action.is_opening() && response.order_id == 0 {
            return Err(ProxyError::Protocol(format!(
                "{} succeeded without an order id",
                request.action.as_str()
            )));
        }
        Ok(response)
    }
}
