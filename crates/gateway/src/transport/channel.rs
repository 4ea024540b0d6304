//! Tokio channel-based transport for single-process mode
//!
//! Broadcast channels give pub/sub semantics: every subscriber sees every
//! message in publish order, a subscriber created later sees nothing older,
//! and a subscriber that falls more than `capacity` messages behind skips
//! ahead instead of slowing the publisher down.
//!
//! Request/reply is an mpsc queue of requests, each carrying a oneshot for
//! its single reply. No serialization - messages are passed directly.

use crate::error::TransportError;
use crate::transport::{Publisher, Requester, Subscriber};
use async_trait::async_trait;
use log::warn;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Channel-based publisher using broadcast
#[derive(Clone)]
pub struct ChannelPublisher<M> {
    tx: broadcast::Sender<M>,
}

impl<M: Clone> ChannelPublisher<M> {
    /// Create a publisher with no subscribers yet
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a publisher/subscriber pair with given capacity
    pub fn pair(capacity: usize) -> (Self, ChannelSubscriber<M>) {
        let publisher = Self::new(capacity);
        let subscriber = publisher.subscribe();
        (publisher, subscriber)
    }

    /// Get another subscriber for this publisher, starting from the next message
    pub fn subscribe(&self) -> ChannelSubscriber<M> {
        ChannelSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl<M> Publisher<M> for ChannelPublisher<M>
where
    M: Clone + Send + Sync + 'static,
{
    async fn publish(&self, msg: &M) -> Result<(), TransportError> {
        // Err only means nobody is listening right now
        let _ = self.tx.send(msg.clone());
        Ok(())
    }
}

/// Channel-based subscriber using broadcast receiver
pub struct ChannelSubscriber<M> {
    rx: broadcast::Receiver<M>,
}

#[async_trait]
impl<M> Subscriber<M> for ChannelSubscriber<M>
where
    M: Clone + Send + 'static,
{
    async fn next(&mut self) -> Result<M, TransportError> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => return Ok(msg),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} messages", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(TransportError::ChannelClosed);
                }
            }
        }
    }

    fn try_next(&mut self) -> Result<Option<M>, TransportError> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) => return Ok(Some(msg)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} messages", skipped);
                    continue;
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(TransportError::ChannelClosed);
                }
            }
        }
    }
}

/// Request message wrapper for channel-based request/reply
struct ChannelRequest<Req, Res> {
    request: Req,
    reply_tx: oneshot::Sender<Res>,
}

/// Channel-based requester for request/reply pattern
pub struct ChannelRequester<Req, Res> {
    tx: mpsc::Sender<ChannelRequest<Req, Res>>,
}

impl<Req, Res> Clone for ChannelRequester<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<Req, Res> ChannelRequester<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Create a requester/responder pair
    pub fn pair(capacity: usize) -> (Self, ChannelResponder<Req, Res>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, ChannelResponder { rx })
    }
}

#[async_trait]
impl<Req, Res> Requester<Req, Res> for ChannelRequester<Req, Res>
where
    Req: Clone + Send + Sync + 'static,
    Res: Send + 'static,
{
    async fn request(&self, req: &Req) -> Result<Res, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ChannelRequest {
            request: req.clone(),
            reply_tx,
        };

        self.tx
            .send(request)
            .await
            .map_err(|_| TransportError::ChannelClosed)?;

        // Responder dropped the reply sender without answering
        reply_rx.await.map_err(|_| TransportError::ChannelClosed)
    }
}

/// Channel-based responder (server side of request/reply)
pub struct ChannelResponder<Req, Res> {
    rx: mpsc::Receiver<ChannelRequest<Req, Res>>,
}

impl<Req, Res> ChannelResponder<Req, Res> {
    /// Receive the next request; `None` once every requester is gone
    pub async fn next(&mut self) -> Option<(Req, oneshot::Sender<Res>)> {
        self.rx.recv().await.map(|req| (req.request, req.reply_tx))
    }

    /// Stop accepting new requests; already queued ones can still be drained
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pubsub() {
        let (publisher, mut subscriber) = ChannelPublisher::<String>::pair(10);

        publisher.publish(&"hello".to_string()).await.unwrap();

        let msg = subscriber.next().await.unwrap();
        assert_eq!(msg, "hello");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let (publisher, mut sub1) = ChannelPublisher::<i32>::pair(10);
        let mut sub2 = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 2);

        publisher.publish(&42).await.unwrap();

        assert_eq!(sub1.next().await.unwrap(), 42);
        assert_eq!(sub2.next().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let publisher = ChannelPublisher::<i32>::new(4);
        assert!(publisher.publish(&1).await.is_ok());
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_backlog() {
        let (publisher, mut early) = ChannelPublisher::<i32>::pair(10);
        publisher.publish(&1).await.unwrap();
        publisher.publish(&2).await.unwrap();

        let mut late = publisher.subscribe();
        publisher.publish(&3).await.unwrap();

        assert_eq!(early.next().await.unwrap(), 1);
        assert_eq!(early.next().await.unwrap(), 2);
        assert_eq!(early.next().await.unwrap(), 3);
        assert_eq!(late.next().await.unwrap(), 3);
        assert_eq!(late.try_next().unwrap(), None);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let (publisher, mut slow) = ChannelPublisher::<i32>::pair(2);
        for i in 0..5 {
            publisher.publish(&i).await.unwrap();
        }

        // Only the newest `capacity` messages survive, still in order
        assert_eq!(slow.next().await.unwrap(), 3);
        assert_eq!(slow.next().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_request_reply() {
        let (requester, mut responder) = ChannelRequester::<String, String>::pair(10);

        // Spawn responder task
        let handle = tokio::spawn(async move {
            if let Some((req, reply_tx)) = responder.next().await {
                let response = format!("Echo: {}", req);
                let _ = reply_tx.send(response);
            }
        });

        let response = requester.request(&"test".to_string()).await.unwrap();
        assert_eq!(response, "Echo: test");

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_after_responder_dropped() {
        let (requester, responder) = ChannelRequester::<u8, u8>::pair(1);
        drop(responder);

        let err = requester.request(&1).await.unwrap_err();
        assert!(matches!(err, TransportError::ChannelClosed));
    }
}
