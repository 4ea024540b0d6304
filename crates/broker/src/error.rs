use pedlar_gateway::TransportError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Broker service stopped")]
    ServiceStopped,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrokerError>;
