//! Downstream operation the worker runs on behalf of the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use tracing::debug;

use taskrelay_core::{RequestEnvelope, ResponseEnvelope};

use crate::error::DownstreamError;

/// Headers that describe one hop and must not be forwarded.
const HOP_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
];

/// The slow, synchronous operation fronted by the proxy.
///
/// Returns the serialized [`ResponseEnvelope`] the original caller should
/// eventually receive. An error status from the operation is a normal
/// result; `Err` is reserved for failing to run the operation at all.
#[async_trait]
pub trait Downstream: Send + Sync {
    async fn invoke(&self, request: &RequestEnvelope) -> Result<String, DownstreamError>;
}

/// Forwards the envelope to a backend HTTP service.
#[derive(Debug, Clone)]
pub struct HttpDownstream {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDownstream {
    /// Create a downstream targeting `base_url` with a per-call timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DownstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| DownstreamError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a downstream from an existing client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn is_hop_header(name: &str) -> bool {
    HOP_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

#[async_trait]
impl Downstream for HttpDownstream {
    async fn invoke(&self, request: &RequestEnvelope) -> Result<String, DownstreamError> {
        let method = Method::from_bytes(request.http_method.as_bytes())
            .map_err(|e| DownstreamError::InvalidRequest(e.to_string()))?;
        let url = self.url_for(&request.path);

        let mut builder = self
            .client
            .request(method, &url)
            .query(&request.query_string_parameters);
        for (name, value) in request.headers.iter().filter(|(k, _)| !is_hop_header(k)) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let body = request
            .body_bytes()
            .map_err(|e| DownstreamError::InvalidRequest(e.to_string()))?;
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DownstreamError::Transport(e.to_string()))?;

        let status_code = response.status().as_u16();
        let envelope = ResponseEnvelope::new(status_code);
        let envelope = envelope_headers(response.headers(), envelope);
        let body = response
            .bytes()
            .await
            .map_err(|e| DownstreamError::Transport(e.to_string()))?;

        debug!(url = %url, status = status_code, body_len = body.len(), "Downstream answered");

        envelope
            .with_body_bytes(&body)
            .to_json()
            .map_err(|e| DownstreamError::InvalidResponse(e.to_string()))
    }
}

/// Copy response headers, keeping every value of repeated names.
fn envelope_headers(headers: &HeaderMap, mut envelope: ResponseEnvelope) -> ResponseEnvelope {
    for name in headers.keys() {
        if is_hop_header(name.as_str()) {
            continue;
        }
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        envelope = match <[String; 1]>::try_from(values) {
            Ok([value]) => envelope.with_header(name.as_str(), value),
            Err(values) => envelope.with_multi_value_header(name.as_str(), values),
        };
    }
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_joins_paths() {
        let downstream =
            HttpDownstream::with_client(reqwest::Client::new(), "http://backend:9000/");
        assert_eq!(downstream.url_for("/a/b"), "http://backend:9000/a/b");
        assert_eq!(downstream.url_for("a"), "http://backend:9000/a");
    }

    #[test]
    fn test_hop_headers_are_dropped() {
        assert!(is_hop_header("Host"));
        assert!(is_hop_header("content-length"));
        assert!(!is_hop_header("RequestID"));
    }

    #[test]
    fn test_repeated_response_headers_are_kept() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", "a=1".parse().unwrap());
        headers.append("set-cookie", "b=2".parse().unwrap());
        headers.insert("content-type", "text/plain".parse().unwrap());
        headers.insert("transfer-encoding", "chunked".parse().unwrap());

        let envelope = envelope_headers(&headers, ResponseEnvelope::new(200));
        assert_eq!(envelope.multi_value_headers["set-cookie"], vec!["a=1", "b=2"]);
        assert_eq!(envelope.headers["content-type"], "text/plain");
        assert!(envelope.header("transfer-encoding").is_none());
    }

    #[tokio::test]
    async fn test_invalid_method_is_rejected_before_sending() {
        let downstream = HttpDownstream::with_client(reqwest::Client::new(), "http://127.0.0.1:1");
        let request = RequestEnvelope::new("NOT A METHOD", "/x");
        let err = downstream.invoke(&request).await.unwrap_err();
        assert!(matches!(err, DownstreamError::InvalidRequest(_)));
    }
}
