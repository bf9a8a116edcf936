//! TaskRelay Proxy Server

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use taskrelay_store::{FileTaskStore, MemoryTaskStore, TaskStore};
use taskrelay_worker::{HttpDownstream, WorkerController};

use taskrelay_proxy::config::{DispatchKind, StoreKind};
use taskrelay_proxy::sweeper::spawn_sweeper;
use taskrelay_proxy::{
    http, AppState, Config, Dispatcher, HttpDispatcher, LocalDispatcher, Metrics,
    ProxyController,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("taskrelay=info".parse()?))
        .with_target(true)
        .init();

    // Load config
    let config = Config::parse();
    config.validate()?;
    let addr: SocketAddr = config.bind_addr.parse()?;

    let store: Arc<dyn TaskStore> = match config.store {
        StoreKind::Memory => Arc::new(MemoryTaskStore::new()),
        StoreKind::File => Arc::new(FileTaskStore::open(&config.store_dir).await?),
    };

    let dispatcher: Arc<dyn Dispatcher> = match config.dispatch {
        DispatchKind::Local => {
            let backend_url = config.backend_url.as_deref().unwrap_or_default();
            let downstream = HttpDownstream::new(backend_url, config.downstream_timeout())?;
            let worker = WorkerController::new(store.clone(), Arc::new(downstream))
                .with_record_ttl(config.record_ttl());
            Arc::new(LocalDispatcher::new(Arc::new(worker)))
        }
        DispatchKind::Http => {
            let worker_url = config.worker_url.as_deref().unwrap_or_default();
            Arc::new(HttpDispatcher::new(worker_url)?)
        }
    };

    let controller = ProxyController::new(store.clone(), dispatcher, config.policy())
        .with_stage_name(config.stage())
        .with_record_ttl(config.record_ttl());

    let shutdown = CancellationToken::new();
    let state = AppState::new(
        controller,
        store.clone(),
        Arc::new(Metrics::default()),
        shutdown.clone(),
    );

    let sweeper = spawn_sweeper(store, config.purge_interval());

    info!(
        addr = %addr,
        store = ?config.store,
        dispatch = ?config.dispatch,
        stage = ?config.stage(),
        "Starting TaskRelay proxy"
    );

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, http::create_router(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested - redirecting in-flight calls");
            shutdown.cancel();
        })
        .await?;

    sweeper.abort();
    Ok(())
}
