//! Trade request/response messages

use serde::{Deserialize, Serialize};

use crate::codec::{WireError, WireFormat, decode_fixed, encode_fixed, expect_len};
use crate::entities::{OrderId, Side};

/// The only success code understood by callers
pub const RETCODE_OK: u32 = 0;

/// Generic failure: unknown order, unknown action or unpriced market
pub const RETCODE_FAILED: u32 = 1;

const REQUEST_LEN: usize = 17;
const RESPONSE_LEN: usize = 28;

/// Action byte of a trade request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeAction {
    /// Reserved; shape-valid but never executed
    Noop,
    Close,
    Buy,
    Sell,
    /// Any other byte seen on the wire
    Unknown(u8),
}

impl TradeAction {
    /// Side of the position an opening action creates
    pub fn opening_side(&self) -> Option<Side> {
        match self {
            TradeAction::Buy => Some(Side::Long),
            TradeAction::Sell => Some(Side::Short),
            _ => None,
        }
    }

    pub fn is_opening(&self) -> bool {
        self.opening_side().is_some()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Noop => "noop",
            TradeAction::Close => "close",
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::Unknown(_) => "unknown",
        }
    }
}

impl From<u8> for TradeAction {
    fn from(value: u8) -> Self {
        match value {
            0 => TradeAction::Noop,
            1 => TradeAction::Close,
            2 => TradeAction::Buy,
            3 => TradeAction::Sell,
            other => TradeAction::Unknown(other),
        }
    }
}

impl From<TradeAction> for u8 {
    fn from(value: TradeAction) -> Self {
        match value {
            TradeAction::Noop => 0,
            TradeAction::Close => 1,
            TradeAction::Buy => 2,
            TradeAction::Sell => 3,
            TradeAction::Unknown(other) => other,
        }
    }
}

/// One unit of work for the broker. Carries no identity beyond one exchange.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeRequest {
    /// Order to close; ignored for BUY/SELL
    pub order_id: OrderId,
    pub volume: f64,
    pub action: TradeAction,
}

impl TradeRequest {
    pub fn new(order_id: OrderId, volume: f64, action: TradeAction) -> Self {
        Self {
            order_id,
            volume,
            action,
        }
    }

    pub fn buy(volume: f64) -> Self {
        Self::new(0, volume, TradeAction::Buy)
    }

    pub fn sell(volume: f64) -> Self {
        Self::new(0, volume, TradeAction::Sell)
    }

    pub fn close(order_id: OrderId) -> Self {
        Self::new(order_id, 0.0, TradeAction::Close)
    }
}

/// Field order here is the wire layout
#[derive(Serialize, Deserialize)]
struct RawRequest {
    order_id: u64,
    volume: f64,
    action: u8,
}

impl WireFormat for TradeRequest {
    const HEADER_LEN: usize = 0;

    fn frame_len(_header: &[u8]) -> Result<usize, WireError> {
        Ok(REQUEST_LEN)
    }

    fn encode(&self) -> Result<Vec<u8>, WireError> {
        encode_fixed(&RawRequest {
            order_id: self.order_id,
            volume: self.volume,
            action: self.action.into(),
        })
    }

    fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        expect_len(bytes, REQUEST_LEN)?;
        let raw: RawRequest = decode_fixed(bytes)?;
        Ok(Self {
            order_id: raw.order_id,
            volume: raw.volume,
            action: raw.action.into(),
        })
    }
}

/// Outcome of one exchange. `retcode == 0` is success, anything else is failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeResponse {
    pub order_id: OrderId,
    pub price: f64,
    pub profit: f64,
    pub retcode: u32,
}

impl TradeResponse {
    pub fn success(order_id: OrderId, price: f64, profit: f64) -> Self {
        Self {
            order_id,
            price,
            profit,
            retcode: RETCODE_OK,
        }
    }

    /// Generic failure echoing the requested id
    pub fn failure(order_id: OrderId) -> Self {
        Self {
            order_id,
            price: 0.0,
            profit: 0.0,
            retcode: RETCODE_FAILED,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.retcode == RETCODE_OK
    }
}

impl WireFormat for TradeResponse {
    const HEADER_LEN: usize = 0;

    fn frame_len(_header: &[u8]) -> Result<usize, WireError> {
        Ok(RESPONSE_LEN)
    }

    fn encode(&self) -> Result<Vec<u8>, WireError> {
        encode_fixed(self)
    }

    fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        expect_len(bytes, RESPONSE_LEN)?;
        decode_fixed(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let req = TradeRequest::new(0x0102030405060708, 0.25, TradeAction::Sell);
        let bytes = req.encode().unwrap();

        assert_eq!(bytes.len(), 17);
        assert_eq!(&bytes[0..8], &0x0102030405060708u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &0.25f64.to_le_bytes());
        assert_eq!(bytes[16], 3);

        assert_eq!(TradeRequest::decode(&bytes).unwrap(), req);
    }

    #[test]
    fn test_response_layout() {
        let resp = TradeResponse {
            order_id: 42,
            price: 1.19503,
            profit: -4.18,
            retcode: 7,
        };
        let bytes = resp.encode().unwrap();

        assert_eq!(bytes.len(), 28);
        assert_eq!(&bytes[0..8], &42u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &1.19503f64.to_le_bytes());
        assert_eq!(&bytes[16..24], &(-4.18f64).to_le_bytes());
        // retcode sits right after the two doubles, 4-byte aligned
        assert_eq!(&bytes[24..28], &7u32.to_le_bytes());

        assert_eq!(TradeResponse::decode(&bytes).unwrap(), resp);
    }

    #[test]
    fn test_unknown_action_survives_decode() {
        let mut bytes = TradeRequest::buy(0.1).encode().unwrap();
        bytes[16] = 9;

        let req = TradeRequest::decode(&bytes).unwrap();
        assert_eq!(req.action, TradeAction::Unknown(9));
        assert_eq!(u8::from(req.action), 9);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = TradeRequest::decode(&[0u8; 16]).unwrap_err();
        assert_eq!(
            err,
            WireError::Length {
                expected: 17,
                actual: 16
            }
        );
        assert!(TradeResponse::decode(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_failure_response() {
        let resp = TradeResponse::failure(99);
        assert!(!resp.is_ok());
        assert_eq!(resp.order_id, 99);
        assert_eq!(resp.price, 0.0);
        assert_eq!(resp.retcode, RETCODE_FAILED);
    }

    #[test]
    fn test_action_sides() {
        assert_eq!(TradeAction::Buy.opening_side(), Some(Side::Long));
        assert_eq!(TradeAction::Sell.opening_side(), Some(Side::Short));
        assert!(!TradeAction::Close.is_opening());
        assert!(!TradeAction::Noop.is_opening());
    }
}
