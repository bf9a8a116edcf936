//! TaskRelay task record storage.
//!
//! The proxy and the worker only ever talk to storage through [`TaskStore`].
//! Two implementations ship with the crate:
//! - [`MemoryTaskStore`] for single-process deployments and tests
//! - [`FileTaskStore`] for a proxy and a worker sharing a directory

mod error;
mod file;
mod memory;

use async_trait::async_trait;
use taskrelay_core::{RequestId, TaskRecord};

pub use error::StoreError;
pub use file::FileTaskStore;
pub use memory::MemoryTaskStore;

/// Record counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub pending: u64,
    pub created: u64,
}

/// Durable keyed storage for task records.
///
/// Expired records behave exactly like missing ones.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new record. Never overwrites an existing key.
    async fn create(&self, record: &TaskRecord) -> Result<(), StoreError>;

    /// Read a record by identifier.
    async fn get(&self, request_id: &RequestId) -> Result<TaskRecord, StoreError>;

    /// Terminal write of a completed record.
    ///
    /// Upserts, but refuses to replace a record that already holds a result.
    async fn write(&self, record: &TaskRecord) -> Result<(), StoreError>;

    /// Remove a record. Removing a missing record succeeds.
    async fn delete(&self, request_id: &RequestId) -> Result<(), StoreError>;

    /// Drop every expired record, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize, StoreError>;

    /// Count live records by status.
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// Validate a terminal write of `record` over the `live` record it replaces.
pub(crate) fn check_terminal_write(
    live: Option<&TaskRecord>,
    record: &TaskRecord,
) -> Result<(), StoreError> {
    match record.check_replaces(live) {
        Ok(()) => Ok(()),
        Err(_) if live.is_some_and(TaskRecord::is_complete) => {
            Err(StoreError::AlreadyCompleted(record.request_id.clone()))
        }
        Err(e) => Err(StoreError::InvalidWrite(e.to_string())),
    }
}
