//! Wire message types exchanged between feed, broker and proxy

pub mod feed;
pub mod trade;

pub use feed::{FeedMessage, TOPIC_BAR, TOPIC_TICK};
pub use trade::{RETCODE_FAILED, RETCODE_OK, TradeAction, TradeRequest, TradeResponse};
