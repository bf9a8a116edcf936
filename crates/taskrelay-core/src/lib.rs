//! TaskRelay Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Record storage
//! - Runtime specifics
//!
//! All types here describe the asynchronous-completion protocol: the task
//! record and its state machine, the request/response envelopes that travel
//! through it, and the timing policy that bounds a poll.

pub mod envelope;
pub mod error;
pub mod ids;
pub mod policy;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use envelope::{RequestEnvelope, ResponseEnvelope, REQUEST_ID_HEADER, REQUEST_ID_QUERY_PARAM};
pub use error::CoreError;
pub use ids::RequestId;
pub use policy::PollPolicy;
pub use status::TaskStatus;
pub use task::TaskRecord;
