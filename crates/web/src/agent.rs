//! Trading agent client
//!
//! [`TradeClient`] posts trade commands to `POST /trade`. [`Agent`] keeps the
//! agent's own view of its open positions and session balance, and records
//! only what the endpoint confirmed: a failed or timed out close leaves the
//! position in place. [`Agent::run`] dispatches ticker frames to a
//! [`Strategy`] and closes whatever is left open when the feed ends.

use async_trait::async_trait;
use pedlar_core::{Bar, FeedMessage, OrderId, Side, TradeAction};
use pedlar_gateway::{Subscriber, TransportError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::presentation::rest::dto::{ErrorResponse, TradeReply};
use crate::proxy::{MIN_VOLUME, TradeCommand};

/// Code the endpoint uses when the broker's answer never arrived
const CODE_TIMEOUT: i32 = -1007;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {code} - {msg}")]
    Api { code: i32, msg: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("order id {0} cannot be sent")]
    OrderIdRange(OrderId),

    #[error("ticker error: {0}")]
    Ticker(#[from] TransportError),
}

impl AgentError {
    /// The trade may or may not have happened
    pub fn is_unknown_outcome(&self) -> bool {
        matches!(self, AgentError::Api { code, .. } if *code == CODE_TIMEOUT)
    }
}

/// HTTP client for the trade endpoint
#[derive(Clone)]
pub struct TradeClient {
    client: Client,
    base_url: String,
    name: String,
}

impl TradeClient {
    pub fn new(base_url: impl Into<String>, name: impl Into<String>) -> Self {
        TradeClient {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// One trade command, answered with the broker's confirmed fields
    pub async fn talk(
        &self,
        order_id: OrderId,
        volume: f64,
        action: TradeAction,
    ) -> Result<TradeReply, AgentError> {
        let command = TradeCommand {
            order_id: i64::try_from(order_id).map_err(|_| AgentError::OrderIdRange(order_id))?,
            volume,
            action: u8::from(action) as i64,
            name: Some(self.name.clone()),
        };
        let url = format!("{}/trade", self.base_url);
        let resp = self.client.post(&url).json(&command).send().await?;

        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, AgentError> {
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ErrorResponse>(&text) {
                return Err(AgentError::Api {
                    code: err.code,
                    msg: err.msg,
                });
            }
            return Err(AgentError::Parse(format!("HTTP {}: {}", status, text)));
        }

        serde_json::from_str(&text).map_err(|e| AgentError::Parse(e.to_string()))
    }
}

/// A position the endpoint confirmed as opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub id: OrderId,
    pub price: f64,
    pub volume: f64,
    pub side: Side,
}

/// Callbacks driven by [`Agent::run`]
#[async_trait]
pub trait Strategy: Send {
    async fn on_tick(&mut self, _agent: &mut Agent, _bid: f64, _ask: f64) -> Result<(), AgentError> {
        Ok(())
    }

    async fn on_bar(&mut self, _agent: &mut Agent, _bar: Bar) -> Result<(), AgentError> {
        Ok(())
    }
}

pub struct Agent {
    client: TradeClient,
    orders: BTreeMap<OrderId, Position>,
    balance: f64,
}

impl Agent {
    pub fn new(client: TradeClient) -> Self {
        Self {
            client,
            orders: BTreeMap::new(),
            balance: 0.0,
        }
    }

    pub fn client(&self) -> &TradeClient {
        &self.client
    }

    /// Open positions by id
    pub fn orders(&self) -> &BTreeMap<OrderId, Position> {
        &self.orders
    }

    /// Sum of confirmed profits this session
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Go long. With `reverse`, short positions are closed first and a failed
    /// close aborts the buy. With `single`, nothing happens while a long is open.
    pub async fn buy(
        &mut self,
        volume: f64,
        single: bool,
        reverse: bool,
    ) -> Result<Option<Position>, AgentError> {
        self.place(Side::Long, volume, single, reverse).await
    }

    /// Go short; see [`Agent::buy`]
    pub async fn sell(
        &mut self,
        volume: f64,
        single: bool,
        reverse: bool,
    ) -> Result<Option<Position>, AgentError> {
        self.place(Side::Short, volume, single, reverse).await
    }

    async fn place(
        &mut self,
        side: Side,
        volume: f64,
        single: bool,
        reverse: bool,
    ) -> Result<Option<Position>, AgentError> {
        if reverse {
            let opposite: Vec<OrderId> = self
                .orders
                .values()
                .filter(|p| p.side == side.opposite())
                .map(|p| p.id)
                .collect();
            self.close(&opposite).await?;
        }
        if single && self.orders.values().any(|p| p.side == side) {
            return Ok(None);
        }

        let action = match side {
            Side::Long => TradeAction::Buy,
            Side::Short => TradeAction::Sell,
        };
        info!("Placing a {} order", side);
        let reply = self.client.talk(0, volume, action).await.inspect_err(|e| {
            error!("Failed to place {} order: {}", side, e);
        })?;

        let position = Position {
            id: reply.order_id,
            price: reply.price,
            volume,
            side,
        };
        self.orders.insert(position.id, position);
        Ok(Some(position))
    }

    /// Close the given positions in order, stopping at the first failure.
    /// Returns the profit realised by this call.
    pub async fn close(&mut self, ids: &[OrderId]) -> Result<f64, AgentError> {
        let mut realised = 0.0;
        for &id in ids {
            let volume = self.orders.get(&id).map_or(MIN_VOLUME, |p| p.volume);
            let reply = self
                .client
                .talk(id, volume, TradeAction::Close)
                .await
                .inspect_err(|e| error!("Failed to close order {}: {}", id, e))?;

            self.orders.remove(&id);
            info!("Closed order {} with profit {}", id, reply.profit);
            self.balance += reply.profit;
            realised += reply.profit;
        }
        Ok(realised)
    }

    /// Close every open position
    pub async fn close_all(&mut self) -> Result<f64, AgentError> {
        let ids: Vec<OrderId> = self.orders.keys().copied().collect();
        self.close(&ids).await
    }

    /// Feed ticks and bars to `strategy` until the feed ends, then close what
    /// is still open. Callback errors are logged and do not stop the loop.
    pub async fn run<S, F>(&mut self, strategy: &mut S, mut feed: F) -> Result<(), AgentError>
    where
        S: Strategy,
        F: Subscriber<FeedMessage>,
    {
        info!("Starting trading loop for {}", self.client.name());
        let ended = loop {
            let msg = match feed.next().await {
                Ok(msg) => msg,
                Err(e) => break e,
            };
            let result = match msg {
                FeedMessage::Tick(t) => strategy.on_tick(self, t.bid, t.ask).await,
                FeedMessage::Bar(b) => strategy.on_bar(self, b).await,
            };
            if let Err(e) = result {
                warn!("Strategy callback failed: {}", e);
            }
        };

        info!(
            "Feed ended ({}), closing {} open orders",
            ended,
            self.orders.len()
        );
        self.close_all().await?;
        match ended {
            TransportError::ChannelClosed => Ok(()),
            other => Err(other.into()),
        }
    }
}
