use log::{error, info};
use pedlar_core::{Order, TOPIC_TICK, TradeRequest, TradeResponse};
use pedlar_gateway::TcpResponder;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::feed::PriceFeed;
use crate::application::{BrokerHandle, BrokerService, ExecutionBroker, report_orphans};
use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};

/// A running broker: ticker ingestion, the broker actor and its TCP front end
pub struct BrokerServer {
    feed: PriceFeed,
    handle: BrokerHandle,
    local_addr: SocketAddr,
    ingest_task: JoinHandle<()>,
    serve_task: JoinHandle<()>,
    service_task: JoinHandle<ExecutionBroker>,
}

impl BrokerServer {
    pub async fn start(config: &BrokerConfig) -> Result<Self> {
        config.validate()?;

        let feed = PriceFeed::new(config.feed_capacity);
        let ingest_task = tokio::spawn(feed.clone().ingest_from(
            config.ticker.clone(),
            vec![TOPIC_TICK],
            Duration::from_millis(config.reconnect_ms),
        ));

        let broker = ExecutionBroker::new(config.order_id, f64::from(config.leverage));
        let (handle, service_task) =
            BrokerService::spawn(broker, feed.handle(), config.request_queue);

        let bound = TcpResponder::<TradeRequest, TradeResponse>::bind(&config.broker_host).await;
        let responder = match bound {
            Ok(responder) => responder,
            Err(e) => {
                ingest_task.abort();
                handle.shutdown();
                return Err(e.into());
            }
        };
        let local_addr = responder.local_addr()?;

        let requester = handle.requester();
        let serve_task = tokio::spawn(async move {
            if let Err(e) = responder.serve(requester).await {
                error!("Broker endpoint failed: {}", e);
            }
        });

        info!(
            "Broker listening on tcp://{} with ticker {}",
            local_addr, config.ticker
        );

        Ok(Self {
            feed,
            handle,
            local_addr,
            ingest_task,
            serve_task,
            service_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn feed(&self) -> &PriceFeed {
        &self.feed
    }

    pub fn handle(&self) -> &BrokerHandle {
        &self.handle
    }

    /// Stop everything and return the orders left open, after logging them
    pub async fn shutdown(self) -> Result<Vec<Order>> {
        self.serve_task.abort();
        self.ingest_task.abort();
        self.handle.shutdown();

        let broker = self
            .service_task
            .await
            .map_err(|_| BrokerError::ServiceStopped)?;
        let orphans = broker.into_orphans();
        report_orphans(&orphans);
        Ok(orphans)
    }
}
