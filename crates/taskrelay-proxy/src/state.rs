//! Shared application state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use taskrelay_store::TaskStore;

use crate::metrics::Metrics;
use crate::proxy::ProxyController;

/// Shared application state.
pub struct AppState {
    /// Coordinator for every proxied call.
    pub controller: ProxyController,

    /// Task store, also read directly for record metrics.
    pub store: Arc<dyn TaskStore>,

    /// Counters shared with the controller.
    pub metrics: Arc<Metrics>,

    /// Fires on shutdown; in-flight polls redirect instead of waiting.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    ///
    /// The controller is rebuilt to report into `metrics`.
    pub fn new(
        controller: ProxyController,
        store: Arc<dyn TaskStore>,
        metrics: Arc<Metrics>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            controller: controller.with_metrics(metrics.clone()),
            store,
            metrics,
            shutdown,
        })
    }
}
