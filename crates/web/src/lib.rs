//! Web boundary of the Pedlar broker
//!
//! - [`proxy`]: validation and the timed request/reply exchange with the broker
//! - [`relay`]: fan-out of feed updates to agents (TCP) and browsers (websocket)
//! - [`presentation`]: axum routes `POST /trade`, `GET /ws/ticker`, `GET /health`
//! - [`agent`]: client side for trading agents (trade endpoint + ticker)
//!
//! Persistence, sessions and the leaderboard live outside this crate; callers
//! get the broker's response fields back and record them themselves.

pub mod agent;
pub mod config;
pub mod presentation;
pub mod proxy;
pub mod relay;

pub use agent::{Agent, AgentError, Position, Strategy, TradeClient};
pub use config::{ConfigError, WebConfig};
pub use presentation::rest::{AppState, create_router};
pub use proxy::{BrokerProxy, Connect, ProxyError, TcpConnector, TradeCommand};
pub use relay::{TickView, TickerRelay};
