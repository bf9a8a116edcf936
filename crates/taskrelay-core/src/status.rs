//! Status of a task record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a task record in the store.
///
/// The only valid transition is `Pending -> Created`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Work dispatched, result not yet available.
    #[default]
    Pending,
    /// Work complete, result stored.
    Created,
}

impl TaskStatus {
    /// Returns true if the record holds a deliverable result.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Created)
    }

    /// Returns true if moving from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!((self, next), (Self::Pending, Self::Created))
    }

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Created => "CREATED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
