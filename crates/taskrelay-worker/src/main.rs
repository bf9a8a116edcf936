//! TaskRelay Worker Service

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use taskrelay_store::FileTaskStore;
use taskrelay_worker::{http, Config, HttpDownstream, WorkerController};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("taskrelay=info".parse()?))
        .with_target(true)
        .init();

    // Load config
    let config = Config::parse();
    let addr: SocketAddr = config.bind_addr.parse()?;

    let store = FileTaskStore::open(&config.store_dir).await?;
    let downstream = HttpDownstream::new(&config.backend_url, config.downstream_timeout())?;
    let controller = WorkerController::new(Arc::new(store), Arc::new(downstream))
        .with_record_ttl(config.record_ttl());

    info!(
        addr = %addr,
        store_dir = %config.store_dir.display(),
        backend = %config.backend_url,
        "Starting TaskRelay worker"
    );

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, http::create_router(Arc::new(controller))).await?;

    Ok(())
}
