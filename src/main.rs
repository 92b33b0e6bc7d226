//! Botcrew orchestrator -- the control plane coordinating a fleet of
//! long-lived AI agent workers: routing messages through persistent
//! channels, reconciling desired vs. observed worker state, and serving
//! each worker's one-shot boot configuration.

mod activity;
mod api;
mod boot_config;
mod bus;
mod config;
mod db;
mod error;
mod hub;
mod ids;
mod pagination;
mod pubsub_listener;
mod queue;
mod reconciler;
mod runtime_adapter;
mod services;
mod session_registry;
mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use api::{create_router, AppState};
use bus::{BusPublisher, BusSubscriber};
use config::Config;
use db::Database;
use queue::{ClusterDnsResolver, DeliveryQueue};
use reconciler::Reconciler;
use runtime_adapter::{KubeWorkerRuntime, WorkerRuntime};
use session_registry::SessionRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let config = Config::from_env()?;

    let db = Database::connect(&config).await?;
    tracing::info!("connected to durable store and ran pending migrations");

    let bus_publisher = BusPublisher::connect(&config.redis_url).await?;
    let bus_subscriber = BusSubscriber::new(&config.redis_url)?;

    let runtime: Arc<dyn WorkerRuntime> = Arc::new(
        KubeWorkerRuntime::connect(&config.namespace, config.kubeconfig_path.as_deref()).await?,
    );

    let resolver = Arc::new(ClusterDnsResolver::new(config.namespace.clone(), db.background_pool().clone()));
    let queue = Arc::new(DeliveryQueue::new(db.background_pool().clone(), resolver, &config));
    let queue_workers = Arc::clone(&queue).spawn();

    let session_registry = Arc::new(SessionRegistry::new());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let reconciler = Reconciler::new(Arc::new(db.clone()), Arc::clone(&runtime), config.reconciler_period());
    let reconciler_task = tokio::spawn(reconciler.run(shutdown_rx.clone()));

    let pubsub_task = tokio::spawn(pubsub_listener::run(
        bus_subscriber,
        Arc::clone(&session_registry),
        shutdown_rx.clone(),
    ));

    let state = AppState {
        db,
        bus_publisher,
        queue,
        runtime,
        session_registry,
        http: reqwest::Client::new(),
    };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let compression = CompressionLayer::new().gzip(true).br(true).deflate(true).zstd(true);
    let app = create_router(state).layer(cors).layer(compression);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "botcrew orchestrator listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await?;

    // Reconciler, then Pub/Sub Listener, then the delivery queue's worker
    // tasks -- each depends on the ones after it for its own adapters, so
    // they're stopped in the reverse order they were brought up.
    let _ = shutdown_tx.send(true);
    let _ = reconciler_task.await;
    let _ = pubsub_task.await;
    for worker in queue_workers {
        worker.abort();
    }

    tracing::info!("botcrew orchestrator shut down cleanly");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
