//! Proxy controller - the asynchronous-completion protocol.
//!
//! A call either starts a task (no `requestID` query parameter) or rejoins
//! one, then polls the task record until one of:
//! - the record is `CREATED`: its stored response is returned and the
//!   record deleted
//! - the record cannot be read: an error response
//! - the poll budget runs out: a 303 pointing back at the same path with
//!   the task's `requestID`, so the caller can resume without a new dispatch

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use taskrelay_core::{PollPolicy, RequestEnvelope, RequestId, ResponseEnvelope, TaskRecord};
use taskrelay_store::TaskStore;

use crate::dispatch::Dispatcher;
use crate::error::ProxyError;
use crate::metrics::{Metrics, Outcome};

/// Result of a call that did not fail.
#[derive(Debug, Clone, PartialEq)]
enum Delivery {
    /// The stored response, ready for the caller.
    Completed(ResponseEnvelope),
    /// Still pending when the budget ran out.
    Pending(RequestId),
}

/// Public-facing coordinator for task creation, dispatch and polling.
pub struct ProxyController {
    store: Arc<dyn TaskStore>,
    dispatcher: Arc<dyn Dispatcher>,
    policy: PollPolicy,
    stage_name: Option<String>,
    record_ttl: Option<chrono::Duration>,
    metrics: Arc<Metrics>,
}

impl ProxyController {
    /// Create a new ProxyController.
    pub fn new(
        store: Arc<dyn TaskStore>,
        dispatcher: Arc<dyn Dispatcher>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            store,
            dispatcher,
            policy,
            stage_name: None,
            record_ttl: None,
            metrics: Arc::new(Metrics::default()),
        }
    }

    /// Builder method to prefix redirect locations with a stage.
    pub fn with_stage_name(mut self, stage_name: Option<String>) -> Self {
        self.stage_name = stage_name;
        self
    }

    /// Builder method to expire pending records after `ttl`.
    pub fn with_record_ttl(mut self, ttl: Option<chrono::Duration>) -> Self {
        self.record_ttl = ttl;
        self
    }

    /// Builder method to share a metrics registry.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Serve one call that arrived at `arrived_at`.
    pub async fn handle(&self, request: RequestEnvelope, arrived_at: Instant) -> ResponseEnvelope {
        self.handle_with_cancel(request, arrived_at, &CancellationToken::new())
            .await
    }

    /// Serve one call, stopping the poll early if `cancel` fires.
    ///
    /// A cancelled call answers as if its budget had run out, which leaves
    /// the task resumable.
    pub async fn handle_with_cancel(
        &self,
        request: RequestEnvelope,
        arrived_at: Instant,
        cancel: &CancellationToken,
    ) -> ResponseEnvelope {
        match self.serve(&request, arrived_at, cancel).await {
            Ok(Delivery::Completed(response)) => {
                self.metrics.record(Outcome::Completed);
                response
            }
            Ok(Delivery::Pending(request_id)) => {
                let location = request.resume_location(self.stage_name.as_deref(), &request_id);
                info!(
                    request_id = %request_id,
                    location = %location,
                    "Poll budget exhausted - redirecting caller"
                );
                self.metrics.record(Outcome::Redirect);
                ResponseEnvelope::see_other(location)
            }
            Err(e) => {
                let status = e.status_code();
                if status == 404 {
                    warn!(error = %e, "Unknown task requested");
                    self.metrics.record(Outcome::NotFound);
                } else {
                    error!(error = %e, status, "Proxy call failed");
                    self.metrics.record(Outcome::Error);
                }
                ResponseEnvelope::json_error(status, e.to_string())
            }
        }
    }

    async fn serve(
        &self,
        request: &RequestEnvelope,
        arrived_at: Instant,
        cancel: &CancellationToken,
    ) -> Result<Delivery, ProxyError> {
        let request_id = match request.resumption_id() {
            Some(request_id) => {
                debug!(request_id = %request_id, "Resuming task");
                request_id
            }
            None => self.start(request).await?,
        };

        let elapsed = arrived_at.elapsed();
        if elapsed > self.policy.early_failure_after {
            return Err(ProxyError::SlowStart { elapsed });
        }

        self.poll(&request_id, arrived_at, cancel).await
    }

    /// Create a pending record and dispatch the worker for it.
    async fn start(&self, request: &RequestEnvelope) -> Result<RequestId, ProxyError> {
        let mut record = TaskRecord::pending();
        if let Some(ttl) = self.record_ttl {
            record = record.with_ttl(ttl);
        }
        let request_id = record.request_id.clone();

        self.store.create(&record).await.map_err(ProxyError::Create)?;
        self.metrics.task_created();

        self.dispatcher
            .dispatch(request.attach_id(&request_id))
            .await?;

        info!(
            request_id = %request_id,
            method = %request.http_method,
            path = %request.path,
            "Task created and dispatched"
        );
        Ok(request_id)
    }

    /// Poll the record until it completes, the budget runs out, or the call
    /// is cancelled.
    async fn poll(
        &self,
        request_id: &RequestId,
        arrived_at: Instant,
        cancel: &CancellationToken,
    ) -> Result<Delivery, ProxyError> {
        let deadline = arrived_at + self.policy.poll_budget;
        let mut reads = 0u32;

        while Instant::now() < deadline {
            // A read that outlives the budget or the call is abandoned.
            let record = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(request_id = %request_id, reads, "Poll cancelled");
                    break;
                }
                _ = sleep_until(deadline) => {
                    warn!(request_id = %request_id, reads, "Task read overran the poll budget");
                    break;
                }
                read = self.store.get(request_id) => read.map_err(ProxyError::Read)?,
            };
            reads += 1;

            if record.is_complete() {
                return self.deliver(record).await;
            }

            debug!(request_id = %request_id, reads, "Task still pending");

            let wake = self.next_wake(arrived_at, Instant::now());
            tokio::select! {
                _ = sleep_until(wake.min(deadline)) => {}
                _ = cancel.cancelled() => {
                    info!(request_id = %request_id, reads, "Poll cancelled");
                    break;
                }
            }
        }

        Ok(Delivery::Pending(request_id.clone()))
    }

    /// First point of the poll grid anchored at `arrived_at` that lies
    /// strictly after `now`.
    fn next_wake(&self, arrived_at: Instant, now: Instant) -> Instant {
        let interval = self.policy.poll_interval.as_nanos().max(1);
        let elapsed = now.saturating_duration_since(arrived_at).as_nanos();
        let offset = (elapsed / interval + 1) * interval;
        match u64::try_from(offset) {
            Ok(nanos) => arrived_at + Duration::from_nanos(nanos),
            Err(_) => now,
        }
    }

    /// Hand out a completed record's result and consume the record.
    async fn deliver(&self, record: TaskRecord) -> Result<Delivery, ProxyError> {
        let decoded = record.decode_result();

        // A concurrent reader may already have deleted it.
        if let Err(e) = self.store.delete(&record.request_id).await {
            warn!(request_id = %record.request_id, error = %e, "Failed to delete consumed task");
        }

        let response = decoded.map_err(|e| ProxyError::Marshal(e.to_string()))?;
        info!(
            request_id = %record.request_id,
            status = response.status_code,
            "Delivering task result"
        );
        Ok(Delivery::Completed(response))
    }
}
