mod book;
mod broker;
mod service;

pub use book::OrderBook;
pub use broker::{ExecutionBroker, Rejection, report_orphans};
pub use service::{BrokerHandle, BrokerService, BrokerStats};
