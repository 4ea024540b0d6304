//! Fan-out of price feed updates
//!
//! Agents get the raw frames (ticks and bars) over a [`TcpPublisher`];
//! websocket sessions get ticks only, as display-rounded [`TickView`]s on an
//! in-process broadcast. Both sides are bounded broadcasts, so a slow or
//! dead subscriber skips ahead or is dropped without touching the others.

use pedlar_core::{FeedMessage, PriceSnapshot};
use pedlar_gateway::{
    ChannelPublisher, ChannelSubscriber, Endpoint, Publisher, Subscriber, TcpPublisher,
    TransportError,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{debug, info};

/// Decimal places shown to browsers
pub const DISPLAY_DECIMALS: u32 = 5;

/// Tick as pushed to websocket clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickView {
    pub bid: f64,
    pub ask: f64,
}

impl From<PriceSnapshot> for TickView {
    fn from(snapshot: PriceSnapshot) -> Self {
        let rounded = snapshot.rounded(DISPLAY_DECIMALS);
        Self {
            bid: rounded.bid,
            ask: rounded.ask,
        }
    }
}

pub struct TickerRelay {
    agents: TcpPublisher<FeedMessage>,
    views: ChannelPublisher<TickView>,
}

impl TickerRelay {
    /// Bind the agent-facing endpoint
    pub async fn bind(endpoint: &Endpoint, capacity: usize) -> Result<Self, TransportError> {
        let agents = TcpPublisher::bind(endpoint, capacity).await?;
        Ok(Self {
            agents,
            views: ChannelPublisher::new(capacity),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.agents.local_addr()
    }

    /// Publisher handle for websocket sessions; subscribe per session
    pub fn views(&self) -> ChannelPublisher<TickView> {
        self.views.clone()
    }

    pub fn subscribe_views(&self) -> ChannelSubscriber<TickView> {
        self.views.subscribe()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.subscriber_count()
    }

    /// Publish one update to every current subscriber
    pub async fn relay(&self, msg: &FeedMessage) -> Result<(), TransportError> {
        self.agents.publish(msg).await?;
        if let FeedMessage::Tick(snapshot) = msg {
            self.views.publish(&TickView::from(*snapshot)).await?;
        }
        Ok(())
    }

    /// Relay everything `source` yields until it closes
    pub async fn run<S>(self, mut source: S) -> Result<(), TransportError>
    where
        S: Subscriber<FeedMessage>,
    {
        info!("Relaying ticker on tcp://{}", self.local_addr());
        loop {
            let msg = source.next().await?;
            debug!(?msg, "relay");
            self.relay(&msg).await?;
        }
    }
}
