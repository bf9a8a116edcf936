//! TaskRelay Worker Library
//!
//! The worker receives a dispatched request envelope, runs the downstream
//! operation to completion, and writes the terminal task record. Nothing it
//! does is visible to the original caller except through that record.

pub mod config;
pub mod controller;
pub mod downstream;
pub mod error;
pub mod http;

pub use config::Config;
pub use controller::WorkerController;
pub use downstream::{Downstream, HttpDownstream};
pub use error::{DownstreamError, WorkerError};
