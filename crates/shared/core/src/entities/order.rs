use serde::{Deserialize, Serialize};

use super::Side;
use crate::values::{PriceSnapshot, Timestamp};

/// Broker-assigned order identifier. Zero is never assigned.
pub type OrderId = u64;

/// Notional units per lot of volume
const CONTRACT_SIZE: f64 = 1000.0;

/// An open position held by the execution broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub open_price: f64,
    pub volume: f64,
    pub side: Side,
    pub opened_at: Timestamp,
}

impl Order {
    pub fn new(id: OrderId, side: Side, open_price: f64, volume: f64, opened_at: Timestamp) -> Self {
        Self {
            id,
            open_price,
            volume,
            side,
            opened_at,
        }
    }

    /// Price this order would open at: longs buy at the ask, shorts sell at the bid
    pub fn open_price_for(side: Side, snapshot: &PriceSnapshot) -> f64 {
        match side {
            Side::Long => snapshot.ask,
            Side::Short => snapshot.bid,
        }
    }

    /// Price this order would close at: longs sell at the bid, shorts buy back at the ask
    pub fn close_price(&self, snapshot: &PriceSnapshot) -> f64 {
        match self.side {
            Side::Long => snapshot.bid,
            Side::Short => snapshot.ask,
        }
    }

    /// Profit of closing at `close_price`, see [`profit`]
    pub fn profit_at(&self, close_price: f64, leverage: f64) -> f64 {
        profit(self.side, self.open_price, close_price, self.volume, leverage)
    }
}

/// Profit in account currency of closing a position.
///
/// Assumes the account currency is the base currency of the traded pair, so the
/// price difference is converted with `1 / close_price` and no other exchange
/// rate. This is an approximation, not a cross-currency valuation.
///
/// `close_price` must be non-zero.
pub fn profit(side: Side, open_price: f64, close_price: f64, volume: f64, leverage: f64) -> f64 {
    let diff = match side {
        Side::Long => close_price - open_price,
        Side::Short => open_price - close_price,
    };
    diff * leverage * volume * CONTRACT_SIZE * (1.0 / close_price)
}
