//! Fixed-layout binary codec
//!
//! Messages are encoded with bincode's legacy configuration (little endian,
//! fixed-width integers, no padding, no length prefixes), so the struct field
//! order *is* the wire layout. Stream transports use [`WireFormat::frame_len`]
//! to find message boundaries from the layout itself.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("unknown topic {0:#04x}")]
    UnknownTopic(u8),

    #[error("codec error: {0}")]
    Codec(String),
}

impl From<bincode::Error> for WireError {
    fn from(err: bincode::Error) -> Self {
        WireError::Codec(err.to_string())
    }
}

/// A message with a fixed binary layout
pub trait WireFormat: Sized {
    /// Bytes that must be read before [`frame_len`](Self::frame_len) can answer
    const HEADER_LEN: usize;

    /// Total frame length, derived from the first `HEADER_LEN` bytes
    fn frame_len(header: &[u8]) -> Result<usize, WireError>;

    /// Encode into a freshly allocated frame
    fn encode(&self) -> Result<Vec<u8>, WireError>;

    /// Decode exactly one frame
    fn decode(bytes: &[u8]) -> Result<Self, WireError>;
}

/// Fail unless `bytes` is exactly `expected` long
pub(crate) fn expect_len(bytes: &[u8], expected: usize) -> Result<(), WireError> {
    if bytes.len() != expected {
        return Err(WireError::Length {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

pub(crate) fn encode_fixed<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode_fixed<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    Ok(bincode::deserialize(bytes)?)
}
