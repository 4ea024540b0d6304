//! Latest-price store fed from the upstream ticker

use log::{debug, info, warn};
use pedlar_core::{FeedMessage, PriceSnapshot};
use pedlar_gateway::{
    ChannelPublisher, ChannelSubscriber, Endpoint, Publisher, Subscriber, TcpSubscriber,
    TransportError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Holds the newest bid/ask and re-publishes every inbound feed message.
///
/// The snapshot keeps no history: readers always see the latest tick only.
/// The update stream is a bounded broadcast, so a slow downstream consumer
/// skips ahead instead of holding up ingestion.
#[derive(Clone)]
pub struct PriceFeed {
    snapshot: Arc<watch::Sender<PriceSnapshot>>,
    updates: ChannelPublisher<FeedMessage>,
}

impl PriceFeed {
    /// `capacity` bounds how far an update subscriber may lag
    pub fn new(capacity: usize) -> Self {
        let (snapshot, _) = watch::channel(PriceSnapshot::default());
        Self {
            snapshot: Arc::new(snapshot),
            updates: ChannelPublisher::new(capacity),
        }
    }

    /// Read side of the snapshot
    pub fn handle(&self) -> PriceHandle {
        PriceHandle {
            rx: self.snapshot.subscribe(),
        }
    }

    /// Every message applied from now on, in arrival order
    pub fn subscribe(&self) -> ChannelSubscriber<FeedMessage> {
        self.updates.subscribe()
    }

    pub fn current(&self) -> PriceSnapshot {
        *self.snapshot.borrow()
    }

    /// Take one inbound message: ticks overwrite the snapshot, bars only pass through
    pub async fn apply(&self, msg: FeedMessage) {
        if let FeedMessage::Tick(snapshot) = msg {
            self.snapshot.send_replace(snapshot);
        }
        // Broadcast publish never fails
        let _ = self.updates.publish(&msg).await;
    }

    /// Ingest until the subscriber fails
    pub async fn run<S>(&self, mut subscriber: S) -> Result<(), TransportError>
    where
        S: Subscriber<FeedMessage>,
    {
        loop {
            let msg = subscriber.next().await?;
            debug!("Feed message {:?}", msg);
            self.apply(msg).await;
        }
    }

    /// Subscribe to a TCP ticker and keep reconnecting after `retry`.
    /// The last snapshot stays in place while disconnected.
    pub async fn ingest_from(self, endpoint: Endpoint, prefix: Vec<u8>, retry: Duration) {
        loop {
            match TcpSubscriber::<FeedMessage>::connect(&endpoint, &prefix).await {
                Ok(subscriber) => {
                    info!("Subscribed to ticker {}", endpoint);
                    if let Err(e) = self.run(subscriber).await {
                        warn!("Ticker {} lost: {}", endpoint, e);
                    }
                }
                Err(e) => warn!("Ticker {} unavailable: {}", endpoint, e),
            }
            tokio::time::sleep(retry).await;
        }
    }
}

/// Cheap read handle on the latest snapshot
#[derive(Clone)]
pub struct PriceHandle {
    rx: watch::Receiver<PriceSnapshot>,
}

impl PriceHandle {
    /// Non-blocking read; zero prices mean nothing has been quoted yet
    pub fn current(&self) -> PriceSnapshot {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pedlar_core::Bar;

    #[tokio::test]
    async fn test_unpriced_until_first_tick() {
        let feed = PriceFeed::new(8);
        let handle = feed.handle();
        assert!(handle.current().is_unpriced());

        feed.apply(FeedMessage::tick(1.1, 1.2)).await;
        assert_eq!(handle.current(), PriceSnapshot::new(1.1, 1.2));
    }

    #[tokio::test]
    async fn test_only_latest_tick_kept() {
        let feed = PriceFeed::new(8);
        for i in 1..=5 {
            feed.apply(FeedMessage::tick(i as f64, i as f64 + 0.5)).await;
        }
        assert_eq!(feed.current(), PriceSnapshot::new(5.0, 5.5));
    }

    #[tokio::test]
    async fn test_bar_does_not_touch_snapshot() {
        let feed = PriceFeed::new(8);
        let mut updates = feed.subscribe();
        feed.apply(FeedMessage::tick(1.1, 1.2)).await;
        feed.apply(FeedMessage::Bar(Bar::new(1.0, 2.0, 0.5, 1.5))).await;

        assert_eq!(feed.current(), PriceSnapshot::new(1.1, 1.2));
        assert_eq!(updates.next().await.unwrap(), FeedMessage::tick(1.1, 1.2));
        assert!(matches!(updates.next().await.unwrap(), FeedMessage::Bar(_)));
    }

    #[tokio::test]
    async fn test_run_stops_on_closed_upstream() {
        let feed = PriceFeed::new(8);
        let (upstream, subscriber) = ChannelPublisher::pair(8);
        upstream.publish(&FeedMessage::tick(2.0, 2.1)).await.unwrap();
        drop(upstream);

        let err = feed.run(subscriber).await.unwrap_err();
        assert!(matches!(err, TransportError::ChannelClosed));
        assert_eq!(feed.current(), PriceSnapshot::new(2.0, 2.1));
    }
}
