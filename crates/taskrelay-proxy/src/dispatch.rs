//! Fire-and-forget dispatch of work to a worker.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use taskrelay_core::RequestEnvelope;
use taskrelay_worker::WorkerController;

/// Dispatch errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    #[error("Failed to reach worker: {0}")]
    Transport(String),

    #[error("Worker rejected invocation with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Starts a worker for a payload without waiting for it to finish.
///
/// `dispatch` returns as soon as the submission is accepted. A submission
/// that cannot be made is reported; the work's own outcome never is.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, payload: RequestEnvelope) -> Result<(), DispatchError>;
}

/// Runs the worker controller on the current tokio runtime.
pub struct LocalDispatcher {
    worker: Arc<WorkerController>,
}

impl LocalDispatcher {
    /// Create a new LocalDispatcher.
    pub fn new(worker: Arc<WorkerController>) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl Dispatcher for LocalDispatcher {
    async fn dispatch(&self, payload: RequestEnvelope) -> Result<(), DispatchError> {
        let handle = Handle::try_current().map_err(|e| DispatchError::Spawn(e.to_string()))?;
        let worker = self.worker.clone();

        handle.spawn(async move {
            let response = worker.handle(&payload).await;
            debug!(status = response.status_code, "Local worker finished");
        });

        Ok(())
    }
}

/// Posts the payload to a worker service that acknowledges with 202.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    invoke_url: String,
}

impl HttpDispatcher {
    /// Create a dispatcher for the worker service at `worker_url`.
    pub fn new(worker_url: &str) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, worker_url))
    }

    /// Create a dispatcher from an existing client.
    pub fn with_client(client: reqwest::Client, worker_url: &str) -> Self {
        Self {
            client,
            invoke_url: format!("{}/v1/invoke", worker_url.trim_end_matches('/')),
        }
    }

    /// Endpoint invocations are posted to.
    pub fn invoke_url(&self) -> &str {
        &self.invoke_url
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, payload: RequestEnvelope) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.invoke_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(
                        url = %self.invoke_url,
                        error = %e,
                        "Failed to read worker rejection body"
                    );
                    format!("<unreadable body: {e}>")
                }
            };
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(url = %self.invoke_url, status = status.as_u16(), "Worker invocation accepted");
        Ok(())
    }
}
