//! Directory-backed task store.
//!
//! Each record lives in `<dir>/<request_id>.json`. New records are written to
//! a temp file and hard-linked into place, so `create` never overwrites and
//! readers never observe a partially written record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use taskrelay_core::{RequestId, TaskRecord, TaskStatus};

use crate::{check_terminal_write, StoreError, StoreStats, TaskStore};

const RECORD_EXTENSION: &str = "json";

/// Task records stored as JSON files in one directory.
#[derive(Debug, Clone)]
pub struct FileTaskStore {
    dir: PathBuf,
}

impl FileTaskStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, request_id: &RequestId) -> Option<PathBuf> {
        let id = request_id.as_str();
        let safe = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        safe.then(|| self.dir.join(format!("{id}.{RECORD_EXTENSION}")))
    }

    fn temp_path(&self, request_id: &RequestId) -> PathBuf {
        self.dir
            .join(format!(".{}.{}.tmp", request_id, Uuid::new_v4().simple()))
    }

    async fn read_record(path: &Path) -> Result<Option<TaskRecord>, StoreError> {
        match fs::read_to_string(path).await {
            Ok(raw) => Ok(Some(TaskRecord::from_json(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_temp(&self, record: &TaskRecord) -> Result<PathBuf, StoreError> {
        let raw = record.to_json()?;
        let tmp = self.temp_path(&record.request_id);
        fs::write(&tmp, raw).await?;
        Ok(tmp)
    }

    async fn remove_quietly(path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove file");
            }
        }
    }

    async fn records(&self) -> Result<Vec<(PathBuf, TaskRecord)>, StoreError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(Some(record)) => records.push((path, record)),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn create(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.request_id).ok_or_else(|| {
            StoreError::Backend(format!("Invalid request id: {}", record.request_id))
        })?;

        if let Some(existing) = Self::read_record(&path).await? {
            if !existing.is_expired() {
                return Err(StoreError::AlreadyExists(record.request_id.clone()));
            }
            Self::remove_quietly(&path).await;
        }

        let tmp = self.write_temp(record).await?;
        let linked = fs::hard_link(&tmp, &path).await;
        Self::remove_quietly(&tmp).await;

        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(record.request_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, request_id: &RequestId) -> Result<TaskRecord, StoreError> {
        let Some(path) = self.record_path(request_id) else {
            return Err(StoreError::NotFound(request_id.clone()));
        };
        match Self::read_record(&path).await? {
            Some(record) if !record.is_expired() => Ok(record),
            _ => Err(StoreError::NotFound(request_id.clone())),
        }
    }

    async fn write(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.request_id).ok_or_else(|| {
            StoreError::Backend(format!("Invalid request id: {}", record.request_id))
        })?;

        let live = Self::read_record(&path)
            .await?
            .filter(|existing| !existing.is_expired());
        check_terminal_write(live.as_ref(), record)?;

        let tmp = self.write_temp(record).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            Self::remove_quietly(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, request_id: &RequestId) -> Result<(), StoreError> {
        let Some(path) = self.record_path(request_id) else {
            return Ok(());
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(request_id = %request_id, "Delete of missing task ignored");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut purged = 0;
        for (path, record) in self.records().await? {
            if record.is_expired_at(now) {
                Self::remove_quietly(&path).await;
                purged += 1;
            }
        }
        Ok(purged)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let now = Utc::now();
        let mut stats = StoreStats::default();
        for (_, record) in self.records().await? {
            if record.is_expired_at(now) {
                continue;
            }
            match record.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Created => stats.created += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn store() -> (tempfile::TempDir, FileTaskStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTaskStore::open(dir.path().join("tasks")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_create_writes_persisted_shape() {
        let (_dir, store) = store().await;
        let record = TaskRecord::pending_with_id(RequestId::new("abc"));
        store.create(&record).await.unwrap();

        let raw = std::fs::read_to_string(store.dir().join("abc.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["RequestID"], "abc");
        assert_eq!(value["Status"], "PENDING");
        assert_eq!(value["Result"], "");
    }

    #[tokio::test]
    async fn test_create_does_not_overwrite() {
        let (_dir, store) = store().await;
        let record = TaskRecord::pending_with_id(RequestId::new("dup"));
        store.create(&record).await.unwrap();

        let err = store.create(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_write_get_delete_cycle() {
        let (_dir, store) = store().await;
        let id = RequestId::generate();
        store.create(&TaskRecord::pending_with_id(id.clone())).await.unwrap();
        store.write(&TaskRecord::completed(id.clone(), "{\"statusCode\":200}")).await.unwrap();

        let record = store.get(&id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Created);

        store.delete(&id).await.unwrap();
        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_write_follows_status_machine() {
        let (_dir, store) = store().await;
        let id = RequestId::new("machine");
        store.create(&TaskRecord::pending_with_id(id.clone())).await.unwrap();

        let err = store
            .write(&TaskRecord::pending_with_id(id.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidWrite(_)));

        store.write(&TaskRecord::completed(id.clone(), "done")).await.unwrap();
        let err = store
            .write(&TaskRecord::completed(id.clone(), "again"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyCompleted(_)));
        assert_eq!(store.get(&id).await.unwrap().result, "done");
    }

    #[tokio::test]
    async fn test_unsafe_ids_never_resolve() {
        let (_dir, store) = store().await;
        let id = RequestId::new("../escape");
        assert!(store.get(&id).await.unwrap_err().is_not_found());
        assert!(store.create(&TaskRecord::pending_with_id(id.clone())).await.is_err());
        store.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (_dir, store) = store().await;
        let expired = TaskRecord::pending().with_expires_at(Utc::now() - Duration::seconds(1));
        let live = TaskRecord::pending().with_ttl(Duration::minutes(5));
        store.create(&expired).await.unwrap();
        store.create(&live).await.unwrap();

        assert!(store.get(&expired.request_id).await.unwrap_err().is_not_found());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.stats().await.unwrap(), StoreStats { pending: 1, created: 0 });
    }
}
