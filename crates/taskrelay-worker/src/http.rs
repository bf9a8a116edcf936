//! HTTP service for dispatched work.
//!
//! Provides endpoints for:
//! - Event-style invocation (`POST /v1/invoke`), acknowledged with 202
//! - Health check (`/health`)

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use taskrelay_core::RequestEnvelope;

use crate::controller::WorkerController;

/// Response body for an accepted invocation.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub request_id: String,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Create the HTTP router for the worker service.
pub fn create_router(controller: Arc<WorkerController>) -> Router {
    Router::new()
        .route("/v1/invoke", post(invoke))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(controller)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Accept a dispatched envelope and run it in the background.
///
/// The caller only learns whether the work was accepted, never its outcome.
async fn invoke(
    State(controller): State<Arc<WorkerController>>,
    Json(request): Json<RequestEnvelope>,
) -> impl IntoResponse {
    let Some(request_id) = request.attached_id() else {
        warn!("Invocation rejected - RequestID header missing");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "RequestID header is missing".to_string(),
            }),
        )
            .into_response();
    };

    info!(request_id = %request_id, "Invocation accepted");
    let accepted = AcceptedResponse {
        request_id: request_id.as_str().to_string(),
    };

    tokio::spawn(async move {
        let response = controller.handle(&request).await;
        info!(
            request_id = %request_id,
            status = response.status_code,
            "Invocation finished"
        );
    });

    (StatusCode::ACCEPTED, Json(accepted)).into_response()
}
