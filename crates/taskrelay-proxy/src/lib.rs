//! TaskRelay Proxy Library
//!
//! This crate provides the public-facing side of TaskRelay: the proxy
//! controller that creates tasks, dispatches them to a worker, polls for
//! their completion within a fixed budget, and redirects the caller when
//! the budget runs out.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod metrics;
pub mod proxy;
pub mod state;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use dispatch::{DispatchError, Dispatcher, HttpDispatcher, LocalDispatcher};
pub use error::ProxyError;
pub use metrics::Metrics;
pub use proxy::ProxyController;
pub use state::AppState;
