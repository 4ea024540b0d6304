//! Integration tests for the web boundary
//!
//! - BrokerProxy against a live broker over TCP, including timeouts
//! - TickerRelay delivery to TCP agents
//! - HTTP routes driven through the axum router

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use pedlar_broker::{BrokerConfig, BrokerServer, BrokerService, ExecutionBroker, PriceFeed};
use pedlar_core::{Bar, FeedMessage, TradeRequest, TradeResponse};
use pedlar_gateway::{
    ChannelRequester, Endpoint, Publisher, Subscriber, TcpPublisher, TcpResponder,
    TcpSubscriber, TransportError,
};
use pedlar_web::{
    AppState, BrokerProxy, Connect, ProxyError, TcpConnector, TickerRelay, TradeCommand,
    create_router,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tower::ServiceExt;

// ============================================================================
// Fixtures
// ============================================================================

fn endpoint_of(addr: std::net::SocketAddr) -> Endpoint {
    Endpoint::new(addr.ip().to_string(), addr.port())
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !done() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true");
}

/// In-process connector straight into a broker actor
struct ChannelConnector {
    requester: ChannelRequester<TradeRequest, TradeResponse>,
}

#[async_trait]
impl Connect for ChannelConnector {
    type Conn = ChannelRequester<TradeRequest, TradeResponse>;

    async fn connect(&self) -> Result<Self::Conn, TransportError> {
        Ok(self.requester.clone())
    }
}

/// Router backed by a real broker actor quoting 1.1000 / 1.1002
async fn broker_app() -> (axum::Router, PriceFeed) {
    let feed = PriceFeed::new(16);
    feed.apply(FeedMessage::tick(1.1000, 1.1002)).await;
    let (handle, _task) = BrokerService::spawn(ExecutionBroker::new(1, 100.0), feed.handle(), 16);

    let proxy = BrokerProxy::new(
        ChannelConnector {
            requester: handle.requester(),
        },
        Duration::from_secs(1),
    );
    let ticks = pedlar_gateway::ChannelPublisher::new(16);
    let app = create_router(Arc::new(AppState::new(proxy, ticks)));
    (app, feed)
}

async fn post_trade(app: &axum::Router, body: Value) -> (StatusCode, Value) {
    post_raw(app, "application/json", body.to_string()).await
}

async fn post_raw(app: &axum::Router, content_type: &str, body: String) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/trade")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

// ============================================================================
// Proxy against a live broker
// ============================================================================

#[tokio::test]
async fn test_proxy_against_tcp_broker() {
    let ticker = TcpPublisher::<FeedMessage>::bind(&Endpoint::ephemeral(), 16)
        .await
        .unwrap();
    let config = BrokerConfig {
        ticker: endpoint_of(ticker.local_addr()),
        broker_host: Endpoint::ephemeral(),
        reconnect_ms: 20,
        ..Default::default()
    };
    let server = BrokerServer::start(&config).await.unwrap();
    wait_until(|| ticker.subscriber_count() == 1).await;

    ticker.publish(&FeedMessage::tick(1.25, 1.25)).await.unwrap();
    wait_until(|| !server.feed().current().is_unpriced()).await;

    let proxy = BrokerProxy::new(
        TcpConnector::new(endpoint_of(server.local_addr()), Some(Duration::ZERO)),
        Duration::from_secs(1),
    );

    let open = proxy.handle(&TradeCommand::new(0, 0.5, 2)).await.unwrap();
    assert_eq!(open.order_id, 1);

    let close = proxy
        .handle(&TradeCommand::new(open.order_id as i64, 0.5, 1))
        .await
        .unwrap();
    assert_eq!(close.profit, 0.0);

    let again = proxy
        .handle(&TradeCommand::new(open.order_id as i64, 0.5, 1))
        .await
        .unwrap_err();
    assert!(matches!(again, ProxyError::Rejected { retcode: 1, .. }));

    let noop = proxy.handle(&TradeCommand::new(0, 0.5, 0)).await.unwrap_err();
    assert!(matches!(noop, ProxyError::Rejected { .. }));

    assert!(server.shutdown().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_timeout_leaves_caller_books_alone_and_no_cross_talk() {
    // A broker that sits on its first request for longer than the proxy waits
    let feed = PriceFeed::new(16);
    feed.apply(FeedMessage::tick(1.1, 1.1002)).await;
    let (handle, task) = BrokerService::spawn(ExecutionBroker::new(1, 100.0), feed.handle(), 16);
    let (front, mut back) = ChannelRequester::<TradeRequest, TradeResponse>::pair(16);
    let broker = handle.requester();
    tokio::spawn(async move {
        let mut first = true;
        while let Some((req, reply)) = back.next().await {
            if first {
                first = false;
                sleep(Duration::from_millis(300)).await;
            }
            if let Ok(resp) = pedlar_gateway::Requester::request(&broker, &req).await {
                let _ = reply.send(resp);
            }
        }
    });

    let responder = TcpResponder::<TradeRequest, TradeResponse>::bind(&Endpoint::ephemeral())
        .await
        .unwrap();
    let endpoint = endpoint_of(responder.local_addr().unwrap());
    tokio::spawn(responder.serve(front));

    let proxy = BrokerProxy::new(
        TcpConnector::new(endpoint, Some(Duration::ZERO)),
        Duration::from_millis(50),
    );

    // What an agent keeps locally: only confirmed opens go in
    let mut ledger: HashMap<u64, f64> = HashMap::new();

    match proxy.handle(&TradeCommand::new(0, 0.1, 2)).await {
        Ok(resp) => {
            ledger.insert(resp.order_id, resp.price);
        }
        Err(err) => assert!(matches!(err, ProxyError::Timeout(_)), "got {err}"),
    }
    assert!(ledger.is_empty());

    // The broker still applied the timed out request: the next open gets id 2,
    // and the stale reply for id 1 is never mistaken for this one
    sleep(Duration::from_millis(400)).await;
    let resp = proxy.handle(&TradeCommand::new(0, 0.1, 3)).await.unwrap();
    assert_eq!(resp.order_id, 2);
    assert_eq!(resp.price, 1.1);
    ledger.insert(resp.order_id, resp.price);

    handle.shutdown();
    let orphans = task.await.unwrap().into_orphans();
    let ids: Vec<_> = orphans.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(ledger.len(), 1);
}

// ============================================================================
// Relay
// ============================================================================

#[tokio::test]
async fn test_relay_delivers_in_order_without_backlog() {
    let relay = TickerRelay::bind(&Endpoint::ephemeral(), 64).await.unwrap();
    let endpoint = endpoint_of(relay.local_addr());

    let mut early = TcpSubscriber::<FeedMessage>::connect(&endpoint, &[])
        .await
        .unwrap();
    wait_until(|| relay.agent_count() == 1).await;

    let bar = FeedMessage::Bar(Bar::new(1.0, 1.2, 0.9, 1.1));
    relay.relay(&FeedMessage::tick(1.0, 1.1)).await.unwrap();
    relay.relay(&bar).await.unwrap();
    relay.relay(&FeedMessage::tick(1.2, 1.3)).await.unwrap();

    assert_eq!(early.next().await.unwrap(), FeedMessage::tick(1.0, 1.1));
    assert_eq!(early.next().await.unwrap(), bar);
    assert_eq!(early.next().await.unwrap(), FeedMessage::tick(1.2, 1.3));

    let mut late = TcpSubscriber::<FeedMessage>::connect(&endpoint, &[])
        .await
        .unwrap();
    wait_until(|| relay.agent_count() == 2).await;
    relay.relay(&FeedMessage::tick(2.0, 2.1)).await.unwrap();

    assert_eq!(late.next().await.unwrap(), FeedMessage::tick(2.0, 2.1));
    assert_eq!(early.next().await.unwrap(), FeedMessage::tick(2.0, 2.1));
}

#[tokio::test]
async fn test_relay_runs_from_price_feed() {
    let feed = PriceFeed::new(64);
    let relay = TickerRelay::bind(&Endpoint::ephemeral(), 64).await.unwrap();
    let mut views = relay.subscribe_views();
    tokio::spawn(relay.run(feed.subscribe()));

    feed.apply(FeedMessage::tick(1.234567, 1.234589)).await;
    let view = views.next().await.unwrap();
    assert_eq!(view.bid, 1.23457);
    assert_eq!(view.ask, 1.23459);
}

// ============================================================================
// HTTP
// ============================================================================

#[tokio::test]
async fn test_trade_endpoint_open_and_close() {
    let (app, _feed) = broker_app().await;

    let (status, body) = post_trade(&app, json!({"order_id": 0, "volume": 0.01, "action": 2})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_id"], 1);
    assert_eq!(body["price"], 1.1002);

    let (status, body) = post_trade(&app, json!({"order_id": 1, "volume": 0.01, "action": 1})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], 1.1);
}

#[tokio::test]
async fn test_trade_endpoint_error_codes() {
    let (app, _feed) = broker_app().await;

    let (status, body) = post_trade(&app, json!({"order_id": 0, "volume": 2.0, "action": 2})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], -1100);

    let (status, _) = post_trade(&app, json!({"order_id": -3, "volume": 0.1, "action": 1})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_trade(&app, json!({"order_id": 42, "volume": 0.1, "action": 1})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unreadable_bodies_get_error_shape() {
    let (app, _feed) = broker_app().await;

    let cases = [
        ("application/json", "{\"order_id\": 0, \"volume\":".to_string()),
        ("application/json", "{\"order_id\": \"one\"}".to_string()),
        ("application/json", "{\"order_id\": 9223372036854775808}".to_string()),
        ("text/plain", "order_id=0".to_string()),
    ];
    for (content_type, body) in cases {
        let (status, json) = post_raw(&app, content_type, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json["code"], -1100, "{body}");
        assert!(json["msg"].is_string(), "{body}");
    }
}

#[tokio::test]
async fn test_trade_endpoint_timeout() {
    // Nobody ever answers
    let (requester, _responder) = ChannelRequester::<TradeRequest, TradeResponse>::pair(4);
    let proxy = BrokerProxy::new(ChannelConnector { requester }, Duration::from_millis(30));
    let ticks = pedlar_gateway::ChannelPublisher::new(4);
    let app = create_router(Arc::new(AppState::new(proxy, ticks)));

    let (status, body) = post_trade(&app, json!({"order_id": 0, "volume": 0.1, "action": 3})).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], -1007);
}

#[tokio::test]
async fn test_health() {
    let (app, _feed) = broker_app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
