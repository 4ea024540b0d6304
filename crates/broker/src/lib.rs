// Application layer
pub mod application;

// Infrastructure layer
pub mod infrastructure;

// Cross-cutting concerns
pub mod config;
pub mod error;

// Re-export main types for convenience
pub use application::{
    BrokerHandle, BrokerService, BrokerStats, ExecutionBroker, OrderBook, Rejection,
    report_orphans,
};
pub use config::{BrokerConfig, ConfigError};
pub use error::{BrokerError, Result};
pub use infrastructure::{BrokerServer, PriceFeed, PriceHandle};
