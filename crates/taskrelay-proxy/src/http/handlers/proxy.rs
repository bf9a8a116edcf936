//! Proxied call handler.
//!
//! Translates between HTTP and the envelopes the controller works with.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tokio::time::Instant;
use tracing::warn;

use taskrelay_core::{RequestEnvelope, ResponseEnvelope};

use crate::state::AppState;

/// Response headers that axum computes itself.
const HOP_HEADERS: &[&str] = &["content-length", "transfer-encoding", "connection"];

/// Serve any method on any path through the proxy controller.
pub async fn proxy(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let arrived_at = Instant::now();

    let request = RequestEnvelope {
        http_method: method.as_str().to_string(),
        path: uri.path().to_string(),
        headers: flatten_headers(&headers),
        query_string_parameters: query,
        ..Default::default()
    }
    .with_body_bytes(&body);

    let response = state
        .controller
        .handle_with_cancel(request, arrived_at, &state.shutdown)
        .await;
    into_http_response(response)
}

/// One entry per header name, repeated values joined with `", "`.
fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut flat: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    flat
}

fn into_http_response(envelope: ResponseEnvelope) -> Response {
    let status = StatusCode::from_u16(envelope.status_code).unwrap_or_else(|_| {
        warn!(status = envelope.status_code, "Stored response has an invalid status");
        StatusCode::BAD_GATEWAY
    });
    let body = match envelope.body_bytes() {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Stored response body cannot be decoded");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let mut response = (status, Body::from(body)).into_response();
    let target = response.headers_mut();
    for (name, value) in &envelope.headers {
        if let Some(name) = forwardable_name(name) {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    target.insert(name, value);
                }
                Err(_) => warn!(header = %name, "Dropping invalid response header"),
            }
        }
    }
    for (name, values) in &envelope.multi_value_headers {
        let Some(name) = forwardable_name(name) else {
            continue;
        };
        target.remove(&name);
        for value in values {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    target.append(name.clone(), value);
                }
                Err(_) => warn!(header = %name, "Dropping invalid response header"),
            }
        }
    }
    response
}

/// Parsed header name, or `None` for hop headers and invalid names.
fn forwardable_name(name: &str) -> Option<HeaderName> {
    if HOP_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name)) {
        return None;
    }
    match HeaderName::from_bytes(name.as_bytes()) {
        Ok(name) => Some(name),
        Err(_) => {
            warn!(header = %name, "Dropping invalid response header");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("accept", HeaderValue::from_static("text/html"));
        headers.append("accept", HeaderValue::from_static("application/json"));
        headers.insert("x-trace", HeaderValue::from_static("abc"));

        let flat = flatten_headers(&headers);
        assert_eq!(flat["accept"], "text/html, application/json");
        assert_eq!(flat["x-trace"], "abc");
    }

    #[test]
    fn test_envelope_headers_are_copied() {
        let envelope = ResponseEnvelope::new(201)
            .with_header("Content-Type", "application/json")
            .with_header("Content-Length", "999")
            .with_body("{}");

        let response = into_http_response(envelope);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        let content_length = response.headers().get("content-length");
        assert_ne!(content_length.map(|v| v.as_bytes()), Some(&b"999"[..]));
    }

    #[test]
    fn test_repeated_headers_are_appended() {
        let envelope = ResponseEnvelope::new(200)
            .with_header("Set-Cookie", "ignored=0")
            .with_multi_value_header("Set-Cookie", vec!["a=1".into(), "b=2".into()]);

        let response = into_http_response(envelope);
        let cookies: Vec<_> = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[tokio::test]
    async fn test_base64_body_is_decoded() {
        let bytes = [0x89, b'P', b'N', b'G', 0xff, 0x00, 0xfe];
        let response = into_http_response(ResponseEnvelope::new(200).with_body_bytes(&bytes));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], &bytes[..]);
    }

    #[test]
    fn test_invalid_status_becomes_bad_gateway() {
        let response = into_http_response(ResponseEnvelope::new(42));
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
