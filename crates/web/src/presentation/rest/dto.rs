use pedlar_core::{OrderId, TradeResponse};
use serde::{Deserialize, Serialize};

/// Successful trade, as returned to the caller for persisting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeReply {
    pub order_id: OrderId,
    pub price: f64,
    pub profit: f64,
}

impl From<TradeResponse> for TradeReply {
    fn from(response: TradeResponse) -> Self {
        Self {
            order_id: response.order_id,
            price: response.price,
            profit: response.profit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub ticker_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub msg: String,
}

impl ErrorResponse {
    pub fn new(code: i32, msg: impl Into<String>) -> Self {
        ErrorResponse {
            code,
            msg: msg.into(),
        }
    }
}
