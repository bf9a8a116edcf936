//! Worker controller - runs the downstream operation and stores the outcome.

use std::sync::Arc;

use tracing::{error, info};

use taskrelay_core::{RequestEnvelope, RequestId, ResponseEnvelope, TaskRecord};
use taskrelay_store::TaskStore;

use crate::downstream::Downstream;
use crate::error::WorkerError;

/// Executes dispatched work and performs the terminal write.
pub struct WorkerController {
    store: Arc<dyn TaskStore>,
    downstream: Arc<dyn Downstream>,
    record_ttl: Option<chrono::Duration>,
}

impl WorkerController {
    /// Create a new WorkerController.
    pub fn new(store: Arc<dyn TaskStore>, downstream: Arc<dyn Downstream>) -> Self {
        Self {
            store,
            downstream,
            record_ttl: None,
        }
    }

    /// Builder method to expire stored results after `ttl`.
    pub fn with_record_ttl(mut self, ttl: Option<chrono::Duration>) -> Self {
        self.record_ttl = ttl;
        self
    }

    /// Run the downstream operation for `request` and store its result.
    ///
    /// There is no retry. If the downstream cannot be run, no record is
    /// written and the pending record is left for its TTL to reclaim.
    pub async fn run(&self, request: &RequestEnvelope) -> Result<RequestId, WorkerError> {
        let request_id = request.attached_id().ok_or(WorkerError::MissingRequestId)?;

        info!(
            request_id = %request_id,
            method = %request.http_method,
            path = %request.path,
            "Invoking downstream"
        );

        let result = self.downstream.invoke(request).await.map_err(|e| {
            error!(request_id = %request_id, error = %e, "Downstream invocation failed");
            WorkerError::from(e)
        })?;

        let mut record = TaskRecord::completed(request_id.clone(), result);
        if let Some(ttl) = self.record_ttl {
            record = record.with_ttl(ttl);
        }

        if let Err(e) = self.store.write(&record).await {
            error!(request_id = %request_id, error = %e, "Result lost - failed to store task");
            return Err(e.into());
        }

        info!(request_id = %request_id, "Task result stored");
        Ok(request_id)
    }

    /// Run and report the outcome as the worker's own invocation response.
    pub async fn handle(&self, request: &RequestEnvelope) -> ResponseEnvelope {
        match self.run(request).await {
            Ok(_) => ResponseEnvelope::json_message(201, "The result was created."),
            Err(e) => ResponseEnvelope::json_error(e.status_code(), e.to_string()),
        }
    }
}
