//! Error types for the gateway crate

use pedlar_core::WireError;
use thiserror::Error;

/// Transport-level errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Malformed frame: {0}")]
    Wire(#[from] WireError),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("IO error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            // Peer went away mid-frame or between frames
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe => TransportError::ChannelClosed,
            _ => TransportError::Io(err),
        }
    }
}
