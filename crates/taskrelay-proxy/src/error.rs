//! Proxy errors.

use std::time::Duration;

use taskrelay_store::StoreError;
use thiserror::Error;

use crate::dispatch::DispatchError;

/// Errors that end a proxy call with an error response.
///
/// None of them is retried inside the call; the caller retries by coming
/// back with a resumption identifier.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("There is an issue with creating the task: {0}")]
    Create(StoreError),

    #[error("There is an issue with the worker dispatch: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("There is an issue with the task store: {elapsed:?} spent before polling")]
    SlowStart { elapsed: Duration },

    #[error("{0}")]
    Read(StoreError),

    #[error("There is an issue with unmarshalling the task result: {0}")]
    Marshal(String),
}

impl ProxyError {
    /// HTTP status reported to the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Read(e) if e.is_not_found() => 404,
            _ => 500,
        }
    }
}
