use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Latest best bid / best ask pair.
///
/// The zero value means "no tick has arrived yet". A zero price is never a
/// real quote and callers must treat it as unpriced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub bid: f64,
    pub ask: f64,
}

impl PriceSnapshot {
    pub fn new(bid: f64, ask: f64) -> Self {
        Self { bid, ask }
    }

    /// True until both sides have been quoted at least once
    pub fn is_unpriced(&self) -> bool {
        self.bid == 0.0 || self.ask == 0.0
    }

    /// Both sides rounded for display
    pub fn rounded(&self, decimals: u32) -> Self {
        Self {
            bid: round_to(self.bid, decimals),
            ask: round_to(self.ask, decimals),
        }
    }
}

/// OHLC summary, relayed to agents only
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
        }
    }
}

/// Round to the nearest value with `decimals` digits, ties to even.
///
/// Works on the exact binary value, so `2.675` (stored just below the tie)
/// rounds down and an exact tie such as `0.125` goes to the even digit.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    format!("{:.*}", decimals as usize, value)
        .parse()
        .unwrap_or(value)
}
