//! Price feed messages: a one-byte topic followed by a fixed payload

use crate::codec::{WireError, WireFormat, decode_fixed, encode_fixed, expect_len};
use crate::values::{Bar, PriceSnapshot};

/// Topic byte of a best bid/ask tick
pub const TOPIC_TICK: u8 = 0x00;

/// Topic byte of an OHLC bar
pub const TOPIC_BAR: u8 = 0x01;

const TICK_LEN: usize = 1 + 2 * 8;
const BAR_LEN: usize = 1 + 4 * 8;

/// A message published on the price feed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedMessage {
    Tick(PriceSnapshot),
    Bar(Bar),
}

impl FeedMessage {
    pub fn tick(bid: f64, ask: f64) -> Self {
        FeedMessage::Tick(PriceSnapshot::new(bid, ask))
    }

    pub fn topic(&self) -> u8 {
        match self {
            FeedMessage::Tick(_) => TOPIC_TICK,
            FeedMessage::Bar(_) => TOPIC_BAR,
        }
    }
}

impl WireFormat for FeedMessage {
    const HEADER_LEN: usize = 1;

    fn frame_len(header: &[u8]) -> Result<usize, WireError> {
        match header.first() {
            Some(&TOPIC_TICK) => Ok(TICK_LEN),
            Some(&TOPIC_BAR) => Ok(BAR_LEN),
            Some(&other) => Err(WireError::UnknownTopic(other)),
            None => Err(WireError::Length {
                expected: 1,
                actual: 0,
            }),
        }
    }

    fn encode(&self) -> Result<Vec<u8>, WireError> {
        let payload = match self {
            FeedMessage::Tick(snapshot) => encode_fixed(snapshot)?,
            FeedMessage::Bar(bar) => encode_fixed(bar)?,
        };
        let mut frame = Vec::with_capacity(1 + payload.len());
        frame.push(self.topic());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let len = Self::frame_len(bytes)?;
        expect_len(bytes, len)?;
        match bytes[0] {
            TOPIC_TICK => Ok(FeedMessage::Tick(decode_fixed(&bytes[1..])?)),
            _ => Ok(FeedMessage::Bar(decode_fixed(&bytes[1..])?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_layout() {
        let bytes = FeedMessage::tick(1.1, 1.2).encode().unwrap();

        assert_eq!(bytes.len(), 17);
        assert_eq!(bytes[0], TOPIC_TICK);
        assert_eq!(&bytes[1..9], &1.1f64.to_le_bytes());
        assert_eq!(&bytes[9..17], &1.2f64.to_le_bytes());
    }

    #[test]
    fn test_bar_decode() {
        let mut bytes = vec![TOPIC_BAR];
        for v in [1.0f64, 2.0, 0.5, 1.5] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let msg = FeedMessage::decode(&bytes).unwrap();
        assert_eq!(msg, FeedMessage::Bar(Bar::new(1.0, 2.0, 0.5, 1.5)));
        assert_eq!(msg.encode().unwrap(), bytes);
    }

    #[test]
    fn test_frame_len_by_topic() {
        assert_eq!(FeedMessage::frame_len(&[TOPIC_TICK]).unwrap(), 17);
        assert_eq!(FeedMessage::frame_len(&[TOPIC_BAR]).unwrap(), 33);
        assert_eq!(
            FeedMessage::frame_len(&[0x7f]).unwrap_err(),
            WireError::UnknownTopic(0x7f)
        );
    }

    #[test]
    fn test_truncated_tick_rejected() {
        let bytes = FeedMessage::tick(1.1, 1.2).encode().unwrap();
        assert!(FeedMessage::decode(&bytes[..10]).is_err());
        assert!(FeedMessage::decode(&[]).is_err());
    }
}
