//! Background removal of expired task records.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use taskrelay_store::TaskStore;

/// Spawn a loop that purges expired records every `every`.
///
/// The first purge runs one full period after startup.
pub fn spawn_sweeper(store: Arc<dyn TaskStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_sweep_loop(store, every).await;
    })
}

async fn run_sweep_loop(store: Arc<dyn TaskStore>, every: Duration) {
    let mut interval_timer = tokio::time::interval(every);
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval_timer.tick().await;

    loop {
        interval_timer.tick().await;

        match store.purge_expired().await {
            Ok(0) => debug!("No expired tasks to purge"),
            Ok(purged) => info!(purged, "Purged expired tasks"),
            Err(e) => warn!(error = %e, "Failed to purge expired tasks"),
        }
    }
}
