//! Store errors.

use taskrelay_core::{CoreError, RequestId};
use thiserror::Error;

/// Errors returned by a [`TaskStore`](crate::TaskStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No live record for the identifier.
    #[error("RequestID is wrong: {0}")]
    NotFound(RequestId),

    /// A record already exists under the identifier.
    #[error("Task already exists: {0}")]
    AlreadyExists(RequestId),

    /// The record already holds a result.
    #[error("Task already completed: {0}")]
    AlreadyCompleted(RequestId),

    /// The record would move the stored status backwards.
    #[error("Task cannot be written: {0}")]
    InvalidWrite(String),

    /// The backend is unreachable or rejected the operation.
    #[error("There is an issue with the task store: {0}")]
    Backend(String),

    /// The record could not be encoded or decoded.
    #[error("There is an issue with marshalling the task: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true if the identifier does not resolve.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<CoreError> for StoreError {
    fn from(e: CoreError) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Backend(e.to_string())
    }
}
