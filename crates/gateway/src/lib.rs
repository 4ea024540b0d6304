//! Pedlar Gateway
//!
//! Transport layer for the Pedlar execution broker. Provides:
//! - `Publisher`/`Subscriber`/`Requester` traits
//! - Tokio channel transport for single-process wiring and tests
//! - TCP transport carrying the fixed-layout frames from `pedlar-core`
//!
//! ## Architecture
//!
//! ```text
//!  upstream ticker ──pub/sub──► lbroker ◄──req/rep── pedlarweb ◄── agents, browsers
//!                               (feed +               (proxy +
//!                                broker)               relay)
//! ```
//!
//! ## Transport
//!
//! TCP has no message boundaries, so frames are delimited by their own fixed
//! layout (`WireFormat::frame_len`); no length prefix is added. Pub/sub
//! subscriptions filter on a byte prefix of the frame, so subscribing to
//! `[TOPIC_TICK]` receives ticks only and an empty prefix receives everything.

pub mod error;
pub mod transport;

// Re-export commonly used types
pub use error::TransportError;
pub use transport::{
    Endpoint, Publisher, Requester, Subscriber,
    channel::{ChannelPublisher, ChannelRequester, ChannelResponder, ChannelSubscriber},
    tcp::{TcpPublisher, TcpRequester, TcpResponder, TcpSubscriber},
};
