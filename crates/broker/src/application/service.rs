//! Single-writer actor around [`ExecutionBroker`]
//!
//! The broker and its order book live inside one task. Everything else talks
//! to it through a [`ChannelRequester`], so the read of the price snapshot and
//! the book mutation of a request can never interleave with another request.

use log::{debug, info, warn};
use pedlar_core::{TradeAction, TradeRequest, TradeResponse};
use pedlar_gateway::{ChannelRequester, ChannelResponder};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use super::broker::ExecutionBroker;
use crate::infrastructure::PriceHandle;

/// Request counters, readable while the service runs
#[derive(Debug, Default)]
pub struct BrokerStats {
    requests: AtomicU64,
    opened: AtomicU64,
    closed: AtomicU64,
    rejected: AtomicU64,
}

impl BrokerStats {
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn record(&self, action: TradeAction, response: &TradeResponse) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let counter = match (response.is_ok(), action) {
            (false, _) => &self.rejected,
            (true, TradeAction::Close) => &self.closed,
            (true, _) => &self.opened,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Client side of a running [`BrokerService`]
#[derive(Clone)]
pub struct BrokerHandle {
    requester: ChannelRequester<TradeRequest, TradeResponse>,
    shutdown: Arc<watch::Sender<bool>>,
    stats: Arc<BrokerStats>,
}

impl BrokerHandle {
    /// A requester feeding this service; hand one to each front end
    pub fn requester(&self) -> ChannelRequester<TradeRequest, TradeResponse> {
        self.requester.clone()
    }

    /// Ask the service to stop. Requests already queued are still answered.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn stats(&self) -> &BrokerStats {
        &self.stats
    }
}

pub struct BrokerService {
    broker: ExecutionBroker,
    prices: PriceHandle,
    responder: ChannelResponder<TradeRequest, TradeResponse>,
    shutdown: watch::Receiver<bool>,
    stats: Arc<BrokerStats>,
}

impl BrokerService {
    /// Start the actor. The join handle yields the broker back once the
    /// service stops, so open orders can be reported.
    pub fn spawn(
        broker: ExecutionBroker,
        prices: PriceHandle,
        queue: usize,
    ) -> (BrokerHandle, JoinHandle<ExecutionBroker>) {
        let (requester, responder) = ChannelRequester::pair(queue);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(BrokerStats::default());

        let service = Self {
            broker,
            prices,
            responder,
            shutdown: shutdown_rx,
            stats: stats.clone(),
        };
        let task = tokio::spawn(service.run());

        let handle = BrokerHandle {
            requester,
            shutdown: Arc::new(shutdown_tx),
            stats,
        };
        (handle, task)
    }

    async fn run(mut self) -> ExecutionBroker {
        info!(
            "Broker service started, next order id {}, leverage {}",
            self.broker.next_id(),
            self.broker.leverage()
        );
        let mut detached = false;

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown.changed(), if !detached => {
                    match changed {
                        Ok(()) if *self.shutdown.borrow() => {
                            info!("Broker service shutting down");
                            break;
                        }
                        Ok(()) => {}
                        // Every handle dropped; keep serving until requesters go
                        Err(_) => detached = true,
                    }
                }
                next = self.responder.next() => match next {
                    Some((request, reply)) => self.answer(request, reply),
                    None => {
                        info!("All requesters gone, broker service stopping");
                        return self.broker;
                    }
                }
            }
        }

        // Stop intake, then answer whatever was already queued
        self.responder.close();
        while let Some((request, reply)) = self.responder.next().await {
            self.answer(request, reply);
        }
        self.broker
    }

    fn answer(&mut self, request: TradeRequest, reply: oneshot::Sender<TradeResponse>) {
        let snapshot = self.prices.current();
        let response = self.broker.handle(&request, &snapshot);
        self.stats.record(request.action, &response);
        debug!("{:?} -> {:?}", request, response);

        if reply.send(response).is_err() {
            warn!(
                "Requester gone before response to {} order {} was delivered",
                request.action.as_str(),
                response.order_id
            );
        }
    }
}
