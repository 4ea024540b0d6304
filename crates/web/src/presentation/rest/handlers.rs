use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::presentation::rest::{ApiError, dto::*};
use crate::proxy::{Connect, ProxyError, TradeCommand};

use super::AppState;

/// POST /trade
pub async fn trade<C: Connect>(
    State(state): State<Arc<AppState<C>>>,
    body: Result<Json<TradeCommand>, JsonRejection>,
) -> Result<Json<TradeReply>, ApiError> {
    let Json(command) = body?;
    let agent = command.name.as_deref().unwrap_or("web");

    match state.proxy.handle(&command).await {
        Ok(response) => {
            info!(
                agent,
                action = command.action,
                order_id = response.order_id,
                price = response.price,
                profit = response.profit,
                "trade done"
            );
            Ok(Json(TradeReply::from(response)))
        }
        Err(err) => {
            match &err {
                ProxyError::Timeout(_) => {
                    warn!(agent, ?command, "trade outcome unknown: {}", err)
                }
                _ => info!(agent, ?command, "trade failed: {}", err),
            }
            Err(err.into())
        }
    }
}

/// GET /health
pub async fn health<C: Connect>(State(state): State<Arc<AppState<C>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        ticker_sessions: state.ticks.subscriber_count(),
    })
}
