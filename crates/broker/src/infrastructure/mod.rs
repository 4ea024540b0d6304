pub mod feed;
pub mod server;

pub use feed::{PriceFeed, PriceHandle};
pub use server::BrokerServer;
