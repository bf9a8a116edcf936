//! Test doubles shared by the proxy's unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use taskrelay_core::{PollPolicy, RequestEnvelope, RequestId, TaskRecord};
use taskrelay_store::{MemoryTaskStore, StoreError, StoreStats, TaskStore};

use crate::dispatch::{DispatchError, Dispatcher};
use crate::metrics::Metrics;
use crate::proxy::ProxyController;
use crate::state::AppState;

type DispatchHook = Box<dyn Fn(&RequestEnvelope) + Send + Sync>;

/// Records every payload and optionally reacts to it.
#[derive(Default)]
pub(crate) struct RecordingDispatcher {
    payloads: Mutex<Vec<RequestEnvelope>>,
    hook: Mutex<Option<DispatchHook>>,
}

impl RecordingDispatcher {
    pub(crate) fn payloads(&self) -> Vec<RequestEnvelope> {
        self.payloads.lock().unwrap().clone()
    }

    pub(crate) fn on_dispatch(&self, hook: impl Fn(&RequestEnvelope) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, payload: RequestEnvelope) -> Result<(), DispatchError> {
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(&payload);
        }
        self.payloads.lock().unwrap().push(payload);
        Ok(())
    }
}

/// Always fails to submit.
pub(crate) struct FailingDispatcher;

#[async_trait]
impl Dispatcher for FailingDispatcher {
    async fn dispatch(&self, _payload: RequestEnvelope) -> Result<(), DispatchError> {
        Err(DispatchError::Transport("connection refused".to_string()))
    }
}

/// Counts reads against an inner store.
pub(crate) struct CountingStore {
    inner: Arc<MemoryTaskStore>,
    reads: AtomicUsize,
}

impl CountingStore {
    pub(crate) fn new(inner: Arc<MemoryTaskStore>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
        }
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskStore for CountingStore {
    async fn create(&self, record: &TaskRecord) -> Result<(), StoreError> {
        self.inner.create(record).await
    }

    async fn get(&self, request_id: &RequestId) -> Result<TaskRecord, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(request_id).await
    }

    async fn write(&self, record: &TaskRecord) -> Result<(), StoreError> {
        self.inner.write(record).await
    }

    async fn delete(&self, request_id: &RequestId) -> Result<(), StoreError> {
        self.inner.delete(request_id).await
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.inner.purge_expired().await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.inner.stats().await
    }
}

/// A store with slow creates or reads, or whose every operation fails.
pub(crate) struct SlowStore {
    inner: CountingStore,
    create_delay: Duration,
    read_delay: Duration,
    broken: bool,
}

impl SlowStore {
    fn with_delays(create_delay: Duration, read_delay: Duration, broken: bool) -> Self {
        Self {
            inner: CountingStore::new(Arc::new(MemoryTaskStore::new())),
            create_delay,
            read_delay,
            broken,
        }
    }

    pub(crate) fn slow_create(delay: Duration) -> Self {
        Self::with_delays(delay, Duration::ZERO, false)
    }

    pub(crate) fn slow_reads(delay: Duration) -> Self {
        Self::with_delays(Duration::ZERO, delay, false)
    }

    pub(crate) fn failing() -> Self {
        Self::with_delays(Duration::ZERO, Duration::ZERO, true)
    }

    pub(crate) fn reads(&self) -> usize {
        self.inner.reads()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.broken {
            return Err(StoreError::Backend("table unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SlowStore {
    async fn create(&self, record: &TaskRecord) -> Result<(), StoreError> {
        tokio::time::sleep(self.create_delay).await;
        self.check()?;
        self.inner.create(record).await
    }

    async fn get(&self, request_id: &RequestId) -> Result<TaskRecord, StoreError> {
        tokio::time::sleep(self.read_delay).await;
        self.check()?;
        self.inner.get(request_id).await
    }

    async fn write(&self, record: &TaskRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.write(record).await
    }

    async fn delete(&self, request_id: &RequestId) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete(request_id).await
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.purge_expired().await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.check()?;
        self.inner.stats().await
    }
}

/// App state over `store` with a recording dispatcher.
pub(crate) fn state_with_store(store: Arc<dyn TaskStore>) -> Arc<AppState> {
    let controller = ProxyController::new(
        store.clone(),
        Arc::new(RecordingDispatcher::default()),
        PollPolicy::default(),
    );
    AppState::new(
        controller,
        store,
        Arc::new(Metrics::default()),
        CancellationToken::new(),
    )
}

/// App state over a fresh memory store with a recording dispatcher.
pub(crate) fn state_with_memory_store() -> (Arc<AppState>, Arc<MemoryTaskStore>) {
    let store = Arc::new(MemoryTaskStore::new());
    (state_with_store(store.clone()), store)
}
