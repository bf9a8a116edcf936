//! Task record type.

use crate::{CoreError, RequestId, ResponseEnvelope, TaskStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The persisted unit tracking one logical operation's completion state.
///
/// Serialized with PascalCase keys:
/// `{"RequestID": .., "Status": "PENDING"|"CREATED", "Result": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Record key, immutable once created.
    #[serde(rename = "RequestID")]
    pub request_id: RequestId,

    /// Current status.
    #[serde(rename = "Status")]
    pub status: TaskStatus,

    /// Serialized `ResponseEnvelope`, empty while pending.
    #[serde(rename = "Result", default)]
    pub result: String,

    /// When the record stops resolving, if it has a TTL.
    #[serde(
        rename = "ExpiresAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Create a pending record with a freshly generated identifier.
    pub fn pending() -> Self {
        Self::pending_with_id(RequestId::generate())
    }

    /// Create a pending record for a known identifier.
    pub fn pending_with_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            status: TaskStatus::Pending,
            result: String::new(),
            expires_at: None,
        }
    }

    /// Create the terminal record the worker writes.
    pub fn completed(request_id: RequestId, result: impl Into<String>) -> Self {
        Self {
            request_id,
            status: TaskStatus::Created,
            result: result.into(),
            expires_at: None,
        }
    }

    /// Builder method to expire the record `ttl` from now.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expires_at = Some(Utc::now() + ttl);
        self
    }

    /// Builder method to set an absolute expiry (useful for testing).
    pub fn with_expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Check if the result is available.
    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check if the record has outlived its TTL at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Check if the record has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Decode the stored result into the response the caller receives.
    pub fn decode_result(&self) -> Result<ResponseEnvelope, CoreError> {
        if !self.is_complete() {
            return Err(CoreError::InvalidInput(format!(
                "Task {} has no result yet",
                self.request_id
            )));
        }
        ResponseEnvelope::from_json(&self.result)
    }

    /// Serialize the record to its persisted JSON form.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a record from its persisted JSON form.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }


    /// Check that storing `self` over the live record `current` follows the
    /// status state machine. A missing record counts as `Pending`.
    pub fn check_replaces(&self, current: Option<&TaskRecord>) -> Result<(), CoreError> {
        let from = current.map_or(TaskStatus::Pending, |r| r.status);
        if !from.can_transition_to(self.status) {
            return Err(CoreError::InvalidStateTransition {
                from: from.to_string(),
                to: self.status.to_string(),
            });
        }
        Ok(())
    }
}
