//! Health and metrics handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::warn;

use crate::state::AppState;

/// Health check endpoint.
///
/// Reports degraded with a 503 while the task store cannot be read, since
/// no call can be served without it.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.stats().await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ok", "store": "ok" })),
        ),
        Err(e) => {
            warn!(error = %e, "Task store unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "degraded", "store": e.to_string() })),
            )
        }
    }
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = crate::metrics::collect_metrics(&state).await;
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_support::{state_with_memory_store, state_with_store, SlowStore};

    async fn health_of(state: Arc<AppState>) -> (StatusCode, serde_json::Value) {
        let response = health_check(State(state)).await.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_reachable_store_is_healthy() {
        let (state, _store) = state_with_memory_store();

        let (status, body) = health_of(state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "ok");
    }

    #[tokio::test]
    async fn test_unreachable_store_is_degraded() {
        let state = state_with_store(Arc::new(SlowStore::failing()));

        let (status, body) = health_of(state).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert!(body["store"].as_str().unwrap().contains("table unavailable"));
    }
}
