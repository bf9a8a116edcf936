//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::state::AppState;

/// How a proxy call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The stored result was delivered.
    Completed,
    /// The caller was redirected to resume later.
    Redirect,
    /// The resumption identifier did not resolve.
    NotFound,
    /// Any other error response.
    Error,
}

/// Counters updated by the proxy controller.
#[derive(Debug, Default)]
pub struct Metrics {
    tasks_created: AtomicU64,
    completed: AtomicU64,
    redirected: AtomicU64,
    not_found: AtomicU64,
    failed: AtomicU64,
}

impl Metrics {
    /// Count a newly created task.
    pub fn task_created(&self) {
        self.tasks_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a finished call.
    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Completed => &self.completed,
            Outcome::Redirect => &self.redirected,
            Outcome::NotFound => &self.not_found,
            Outcome::Error => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of tasks created so far.
    pub fn tasks_created(&self) -> u64 {
        self.tasks_created.load(Ordering::Relaxed)
    }

    /// Number of calls that ended with `outcome`.
    pub fn count(&self, outcome: Outcome) -> u64 {
        match outcome {
            Outcome::Completed => self.completed.load(Ordering::Relaxed),
            Outcome::Redirect => self.redirected.load(Ordering::Relaxed),
            Outcome::NotFound => self.not_found.load(Ordering::Relaxed),
            Outcome::Error => self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_call_metrics(&state.metrics, &mut output);
    collect_record_metrics(state, &mut output).await;

    output
}

/// Collect task creation and call outcome counters.
fn collect_call_metrics(metrics: &Metrics, output: &mut String) {
    writeln!(
        output,
        "# HELP taskrelay_tasks_created_total Total number of tasks created"
    )
    .ok();
    writeln!(output, "# TYPE taskrelay_tasks_created_total counter").ok();
    writeln!(output, "taskrelay_tasks_created_total {}", metrics.tasks_created()).ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP taskrelay_responses_total Total number of proxy responses by outcome"
    )
    .ok();
    writeln!(output, "# TYPE taskrelay_responses_total counter").ok();
    for (label, outcome) in [
        ("completed", Outcome::Completed),
        ("redirect", Outcome::Redirect),
        ("not_found", Outcome::NotFound),
        ("error", Outcome::Error),
    ] {
        writeln!(
            output,
            "taskrelay_responses_total{{outcome=\"{label}\"}} {}",
            metrics.count(outcome)
        )
        .ok();
    }
}

/// Collect live record counts by status.
async fn collect_record_metrics(state: &Arc<AppState>, output: &mut String) {
    let stats = match state.store.stats().await {
        Ok(stats) => stats,
        Err(e) => {
            warn!(error = %e, "Failed to collect record metrics");
            return;
        }
    };

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP taskrelay_records Number of live task records by status"
    )
    .ok();
    writeln!(output, "# TYPE taskrelay_records gauge").ok();
    writeln!(output, "taskrelay_records{{status=\"pending\"}} {}", stats.pending).ok();
    writeln!(output, "taskrelay_records{{status=\"created\"}} {}", stats.created).ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state_with_memory_store;
    use taskrelay_core::TaskRecord;
    use taskrelay_store::TaskStore;

    #[tokio::test]
    async fn test_collect_metrics_empty_state() {
        let (state, _) = state_with_memory_store();
        let output = collect_metrics(&state).await;

        // Should contain call metrics
        assert!(output.contains("taskrelay_tasks_created_total 0"));
        assert!(output.contains("taskrelay_responses_total{outcome=\"redirect\"} 0"));

        // Should contain record metrics
        assert!(output.contains("taskrelay_records{status=\"pending\"} 0"));
        assert!(output.contains("taskrelay_records{status=\"created\"} 0"));
    }

    #[tokio::test]
    async fn test_collect_metrics_counts() {
        let (state, store) = state_with_memory_store();
        state.metrics.task_created();
        state.metrics.record(Outcome::Completed);
        state.metrics.record(Outcome::NotFound);
        store.create(&TaskRecord::pending()).await.unwrap();

        let output = collect_metrics(&state).await;
        assert!(output.contains("taskrelay_tasks_created_total 1"));
        assert!(output.contains("taskrelay_responses_total{outcome=\"completed\"} 1"));
        assert!(output.contains("taskrelay_responses_total{outcome=\"not_found\"} 1"));
        assert!(output.contains("taskrelay_records{status=\"pending\"} 1"));
    }
}
