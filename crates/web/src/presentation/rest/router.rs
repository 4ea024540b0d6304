use axum::{
    Router,
    routing::{get, post},
};
use pedlar_gateway::ChannelPublisher;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::presentation::websocket;
use crate::proxy::{BrokerProxy, Connect};
use crate::relay::TickView;

/// Application state shared across handlers
pub struct AppState<C: Connect> {
    pub proxy: BrokerProxy<C>,
    /// Display ticks from the relay; each websocket subscribes on connect
    pub ticks: ChannelPublisher<TickView>,
}

impl<C: Connect> AppState<C> {
    pub fn new(proxy: BrokerProxy<C>, ticks: ChannelPublisher<TickView>) -> Self {
        AppState { proxy, ticks }
    }
}

/// Create the HTTP router
pub fn create_router<C: Connect>(state: Arc<AppState<C>>) -> Router {
    Router::new()
        .route("/trade", post(handlers::trade::<C>))
        .route("/health", get(handlers::health::<C>))
        .route("/ws/ticker", get(websocket::ws_ticker::<C>))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
