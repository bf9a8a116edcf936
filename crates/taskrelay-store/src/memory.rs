//! In-memory task store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use taskrelay_core::{RequestId, TaskRecord, TaskStatus};

use crate::{check_terminal_write, StoreError, StoreStats, TaskStore};

/// Task records held in process memory.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    records: RwLock<HashMap<RequestId, TaskRecord>>,
}

impl MemoryTaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, expired ones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no records are held.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&record.request_id) {
            if !existing.is_expired() {
                return Err(StoreError::AlreadyExists(record.request_id.clone()));
            }
        }
        records.insert(record.request_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, request_id: &RequestId) -> Result<TaskRecord, StoreError> {
        self.records
            .read()
            .await
            .get(request_id)
            .filter(|r| !r.is_expired())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(request_id.clone()))
    }

    async fn write(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let live = records
            .get(&record.request_id)
            .filter(|existing| !existing.is_expired());
        check_terminal_write(live, record)?;
        records.insert(record.request_id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, request_id: &RequestId) -> Result<(), StoreError> {
        if self.records.write().await.remove(request_id).is_none() {
            debug!(request_id = %request_id, "Delete of missing task ignored");
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.is_expired_at(now));
        Ok(before - records.len())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let now = Utc::now();
        let records = self.records.read().await;
        let mut stats = StoreStats::default();
        for record in records.values().filter(|r| !r.is_expired_at(now)) {
            match record.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Created => stats.created += 1,
            }
        }
        Ok(stats)
    }
}
