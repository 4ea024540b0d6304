//! Pedlar Core Domain
//!
//! Pure domain types for the Pedlar execution broker.
//! This crate contains no async, no I/O, and is 100% unit testable.
//!
//! ## Wire layouts
//!
//! All multi-byte fields are little-endian with no padding:
//!
//! ```text
//! Tick           u8 topic | f64 bid | f64 ask                      (17 bytes)
//! Bar            u8 topic | f64 open | f64 high | f64 low | f64 close (33 bytes)
//! TradeRequest   u64 order_id | f64 volume | u8 action             (17 bytes)
//! TradeResponse  u64 order_id | f64 price | f64 profit | u32 retcode (28 bytes)
//! ```

pub mod codec;
pub mod entities;
pub mod messages;
pub mod values;

// Re-export commonly used types at crate root
pub use codec::{WireError, WireFormat};
pub use entities::{Order, OrderId, Side, profit};
pub use messages::{
    FeedMessage, RETCODE_FAILED, RETCODE_OK, TOPIC_BAR, TOPIC_TICK, TradeAction, TradeRequest,
    TradeResponse,
};
pub use values::{Bar, PriceSnapshot, Timestamp, round_to};
