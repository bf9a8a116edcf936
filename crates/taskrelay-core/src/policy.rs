//! Timing policy for the bounded poll.

use std::time::Duration;

use crate::CoreError;

/// Timing contract for one proxy call.
///
/// All three values are measured from the arrival of the call being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between two reads of a pending record.
    pub poll_interval: Duration,

    /// Elapsed time after which the call gives up before polling at all.
    pub early_failure_after: Duration,

    /// Total time the call may spend before redirecting the caller.
    pub poll_budget: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            early_failure_after: Duration::from_secs(16),
            poll_budget: Duration::from_secs(22),
        }
    }
}

impl PollPolicy {
    /// Create a policy from explicit values.
    pub fn new(poll_interval: Duration, early_failure_after: Duration, poll_budget: Duration) -> Self {
        Self {
            poll_interval,
            early_failure_after,
            poll_budget,
        }
    }

    /// Reject policies that could never observe a result.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.poll_interval.is_zero() {
            return Err(CoreError::InvalidInput(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.early_failure_after >= self.poll_budget {
            return Err(CoreError::InvalidInput(format!(
                "early failure threshold ({:?}) must be below the poll budget ({:?})",
                self.early_failure_after, self.poll_budget
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.poll_interval, Duration::from_secs(2));
        assert_eq!(policy.early_failure_after, Duration::from_secs(16));
        assert_eq!(policy.poll_budget, Duration::from_secs(22));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_invalid_policies() {
        let zero = PollPolicy::new(Duration::ZERO, Duration::from_secs(1), Duration::from_secs(2));
        assert!(zero.validate().is_err());

        let inverted = PollPolicy::new(
            Duration::from_secs(1),
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        assert!(inverted.validate().is_err());
    }
}
