//! Request and response envelopes.
//!
//! Both envelopes use the API-gateway proxy shape so a stored result can be
//! handed back to the original caller verbatim. Bodies that are not valid
//! UTF-8 travel base64-encoded with `isBase64Encoded` set.

use crate::{CoreError, RequestId};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Query parameter carrying the resumption identifier on inbound calls.
pub const REQUEST_ID_QUERY_PARAM: &str = "requestID";

/// Header carrying the identifier on the payload handed to the worker.
pub const REQUEST_ID_HEADER: &str = "RequestID";

/// Inbound request as seen by the proxy and forwarded to the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// HTTP method (e.g., "GET", "POST").
    pub http_method: String,

    /// Request path without the query string.
    pub path: String,

    /// Request headers.
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,

    /// Decoded query string parameters.
    #[serde(default, deserialize_with = "null_as_default")]
    pub query_string_parameters: HashMap<String, String>,

    /// Request body, base64 when `is_base64_encoded` is set.
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,

    /// Whether `body` holds base64 of raw bytes.
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl RequestEnvelope {
    /// Create a new envelope with no headers, query, or body.
    pub fn new(http_method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            http_method: http_method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Builder method to add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Builder method to add a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters.insert(key.into(), value.into());
        self
    }

    /// Builder method to set a text body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.is_base64_encoded = false;
        self
    }

    /// Builder method to set a body from raw bytes.
    pub fn with_body_bytes(mut self, bytes: &[u8]) -> Self {
        (self.body, self.is_base64_encoded) = encode_body(bytes);
        self
    }

    /// Raw body bytes.
    pub fn body_bytes(&self) -> Result<Vec<u8>, CoreError> {
        decode_body(&self.body, self.is_base64_encoded)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Resumption identifier supplied by the caller, if any.
    pub fn resumption_id(&self) -> Option<RequestId> {
        self.query_string_parameters
            .get(REQUEST_ID_QUERY_PARAM)
            .and_then(|raw| RequestId::parse(raw))
    }

    /// Identifier attached for the worker, if any.
    pub fn attached_id(&self) -> Option<RequestId> {
        self.header(REQUEST_ID_HEADER).and_then(RequestId::parse)
    }

    /// Copy of this envelope with the identifier attached for the worker.
    pub fn attach_id(&self, id: &RequestId) -> Self {
        let mut payload = self.clone();
        payload
            .headers
            .retain(|k, _| !k.eq_ignore_ascii_case(REQUEST_ID_HEADER));
        payload
            .headers
            .insert(REQUEST_ID_HEADER.to_string(), id.as_str().to_string());
        payload
    }

    /// Location a caller should come back to in order to rejoin `id`.
    ///
    /// The stage, when present, prefixes the path the same way the hosting
    /// gateway does.
    pub fn resume_location(&self, stage: Option<&str>, id: &RequestId) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        match stage.map(|s| s.trim_matches('/')).filter(|s| !s.is_empty()) {
            Some(stage) => format!("/{stage}{path}?{REQUEST_ID_QUERY_PARAM}={id}"),
            None => format!("{path}?{REQUEST_ID_QUERY_PARAM}={id}"),
        }
    }

    /// Serialize to the worker invocation payload.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Outbound response, either produced by the proxy itself or stored by the
/// worker and replayed verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// HTTP status code.
    pub status_code: u16,

    /// Single-valued response headers.
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,

    /// Headers that appear more than once, such as `Set-Cookie`. A name
    /// listed here takes precedence over the same name in `headers`.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub multi_value_headers: HashMap<String, Vec<String>>,

    /// Response body, base64 when `is_base64_encoded` is set.
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,

    /// Whether `body` holds base64 of raw bytes.
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl ResponseEnvelope {
    /// Create a response with the given status and no headers or body.
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            ..Default::default()
        }
    }

    /// `{"error": message}` with a JSON content type.
    pub fn json_error(status_code: u16, message: impl Into<String>) -> Self {
        let body = serde_json::json!({ "error": message.into() }).to_string();
        Self::new(status_code)
            .with_header("Content-Type", "application/json")
            .with_body(body)
    }

    /// `{"message": message}` with a JSON content type.
    pub fn json_message(status_code: u16, message: impl Into<String>) -> Self {
        let body = serde_json::json!({ "message": message.into() }).to_string();
        Self::new(status_code)
            .with_header("Content-Type", "application/json")
            .with_body(body)
    }

    /// 303 See Other pointing at `location`.
    pub fn see_other(location: impl Into<String>) -> Self {
        Self::new(303).with_header("Location", location)
    }

    /// Builder method to add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Builder method to add every value of a repeated header.
    pub fn with_multi_value_header(
        mut self,
        key: impl Into<String>,
        values: Vec<String>,
    ) -> Self {
        self.multi_value_headers.insert(key.into(), values);
        self
    }

    /// Builder method to set a text body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.is_base64_encoded = false;
        self
    }

    /// Builder method to set a body from raw bytes.
    pub fn with_body_bytes(mut self, bytes: &[u8]) -> Self {
        (self.body, self.is_base64_encoded) = encode_body(bytes);
        self
    }

    /// Raw body bytes.
    pub fn body_bytes(&self) -> Result<Vec<u8>, CoreError> {
        decode_body(&self.body, self.is_base64_encoded)
    }

    /// Case-insensitive header lookup, first value for repeated headers.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.multi_value_headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.first())
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }

    /// Serialize for storage in a task record.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored result.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Text bodies are kept as-is; anything else is base64.
fn encode_body(bytes: &[u8]) -> (String, bool) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_owned(), false),
        Err(_) => (STANDARD.encode(bytes), true),
    }
}

fn decode_body(body: &str, is_base64_encoded: bool) -> Result<Vec<u8>, CoreError> {
    if !is_base64_encoded {
        return Ok(body.as_bytes().to_vec());
    }
    STANDARD
        .decode(body)
        .map_err(|e| CoreError::InvalidInput(format!("Invalid base64 body: {e}")))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resumption_id_from_query() {
        let req = RequestEnvelope::new("GET", "/path").with_query("requestID", "abc");
        assert_eq!(req.resumption_id(), Some(RequestId::new("abc")));

        let req = RequestEnvelope::new("GET", "/path").with_query("requestID", "");
        assert_eq!(req.resumption_id(), None);
    }

    #[test]
    fn test_attach_id_replaces_existing_header() {
        let req = RequestEnvelope::new("POST", "/path").with_header("requestid", "spoofed");
        let payload = req.attach_id(&RequestId::new("real"));

        assert_eq!(payload.attached_id(), Some(RequestId::new("real")));
        assert_eq!(payload.headers.len(), 1);
        assert!(req.attached_id().is_some());
    }

    #[test]
    fn test_resume_location_with_stage() {
        let req = RequestEnvelope::new("GET", "/path");
        let id = RequestId::new("abc");
        assert_eq!(
            req.resume_location(Some("stage"), &id),
            "/stage/path?requestID=abc"
        );
        assert_eq!(
            req.resume_location(Some("/stage/"), &id),
            "/stage/path?requestID=abc"
        );
        assert_eq!(req.resume_location(None, &id), "/path?requestID=abc");
        assert_eq!(req.resume_location(Some(""), &id), "/path?requestID=abc");
    }

    #[test]
    fn test_gateway_shape_accepts_null_maps() {
        let raw = r#"{"httpMethod":"GET","path":"/p","headers":null,"queryStringParameters":null,"body":null}"#;
        let req: RequestEnvelope = serde_json::from_str(raw).unwrap();
        assert!(req.headers.is_empty());
        assert!(req.query_string_parameters.is_empty());
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_json_error_body_is_valid_json() {
        let resp = ResponseEnvelope::json_error(500, "There is an issue with \"the store\".");
        let value: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(value["error"], "There is an issue with \"the store\".");
        assert_eq!(resp.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_binary_body_survives_storage() {
        let bytes = [0x89, b'P', b'N', b'G', 0xff, 0x00, 0xfe];
        let resp = ResponseEnvelope::new(200).with_body_bytes(&bytes);
        assert!(resp.is_base64_encoded);

        let restored = ResponseEnvelope::from_json(&resp.to_json().unwrap()).unwrap();
        assert_eq!(restored.body_bytes().unwrap(), bytes);

        let req = RequestEnvelope::new("POST", "/upload").with_body_bytes(&bytes);
        assert_eq!(req.body_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_text_body_stays_plain() {
        let req = RequestEnvelope::new("POST", "/p").with_body_bytes("héllo".as_bytes());
        assert!(!req.is_base64_encoded);
        assert_eq!(req.body, "héllo");
    }

    #[test]
    fn test_corrupt_base64_body_is_an_error() {
        let mut resp = ResponseEnvelope::new(200).with_body("%%%");
        resp.is_base64_encoded = true;
        assert!(resp.body_bytes().is_err());
    }

    #[test]
    fn test_repeated_headers_keep_every_value() {
        let resp = ResponseEnvelope::new(200)
            .with_multi_value_header("Set-Cookie", vec!["a=1".into(), "b=2".into()]);
        let value: serde_json::Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
        assert_eq!(value["multiValueHeaders"]["Set-Cookie"], serde_json::json!(["a=1", "b=2"]));
        assert_eq!(resp.header("set-cookie"), Some("a=1"));
    }

    #[test]
    fn test_response_wire_shape() {
        let resp = ResponseEnvelope::new(200).with_body("ok");
        let value: serde_json::Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["body"], "ok");
        assert_eq!(value["isBase64Encoded"], false);
        assert!(value.get("multiValueHeaders").is_none());
    }
}
