//! Worker errors.

use taskrelay_store::StoreError;
use thiserror::Error;

/// Failure of the mechanism used to run the downstream operation.
///
/// A downstream operation that runs and answers with an error status is not
/// a `DownstreamError`; that answer is stored as the result.
#[derive(Debug, Error)]
pub enum DownstreamError {
    /// The envelope could not be turned into a downstream call.
    #[error("Invalid downstream request: {0}")]
    InvalidRequest(String),

    /// The downstream could not be reached or did not answer in time.
    #[error("Downstream transport error: {0}")]
    Transport(String),

    /// The downstream answered with something that is not a response.
    #[error("Invalid downstream response: {0}")]
    InvalidResponse(String),
}

/// Errors that end a worker invocation without a stored result.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("RequestID header is missing")]
    MissingRequestId,

    #[error("There is an issue with the downstream function: {0}")]
    Downstream(#[from] DownstreamError),

    #[error("There is an issue with the task store: {0}")]
    Store(#[from] StoreError),
}

impl WorkerError {
    /// HTTP status reported to the worker's own invoker.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingRequestId => 400,
            Self::Downstream(_) | Self::Store(_) => 500,
        }
    }
}
