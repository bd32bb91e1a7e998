//! Faucet Gateway
//!
//! HTTP gateway that turns faucet requests into calls against a deployed
//! faucet contract on one of several configured networks:
//! - availability and funding status queries
//! - seeding and topping up a faucet from a caller-supplied key
//! - drips signed by the administrative key
//!
//! Every request is stateless; the only process-wide state is the
//! immutable [`NetworkTable`] built at startup.

pub mod api;
pub mod builder;
pub mod chain;
pub mod config;
pub mod contract;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod network;
pub mod service;
pub mod signer;
pub mod types;
pub mod units;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use network::{Network, NetworkTable};
pub use service::GatewayService;
