//! Transport abstraction layer
//!
//! Unified traits for message passing. Channel and TCP implementations share
//! the same traits so components can be wired in-process for tests and over
//! sockets in deployment.

pub mod channel;
pub mod config;
pub mod tcp;

pub use config::Endpoint;

use crate::error::TransportError;
use async_trait::async_trait;

/// Publisher - fans a message out to every current subscriber
#[async_trait]
pub trait Publisher<M>: Send + Sync
where
    M: Send + Sync,
{
    /// Publish a message. Having no subscribers is not an error.
    async fn publish(&self, msg: &M) -> Result<(), TransportError>;
}

/// Subscriber - receives published messages in arrival order
#[async_trait]
pub trait Subscriber<M>: Send
where
    M: Send,
{
    /// Wait for the next message
    async fn next(&mut self) -> Result<M, TransportError>;

    /// Try to receive without blocking (returns None if no message available)
    fn try_next(&mut self) -> Result<Option<M>, TransportError>;
}

/// Request/Reply - exactly one response per request, one request in flight
#[async_trait]
pub trait Requester<Req, Res>: Send + Sync
where
    Req: Send + Sync,
    Res: Send,
{
    /// Send a request and wait for its response
    async fn request(&self, req: &Req) -> Result<Res, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Ensure traits are object-safe
    fn _assert_publisher_object_safe(_: &dyn Publisher<String>) {}
    fn _assert_subscriber_object_safe(_: &mut dyn Subscriber<String>) {}
    fn _assert_requester_object_safe(_: &dyn Requester<String, String>) {}
}
