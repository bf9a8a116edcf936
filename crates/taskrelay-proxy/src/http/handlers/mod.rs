//! HTTP request handlers.

mod health;
mod proxy;

pub use health::{health_check, metrics_handler};
pub use proxy::proxy;
