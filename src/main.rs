//! marketsync server entry point.
//!
//! Connects the Mirror Store, spawns the reconciler and the supervised
//! chain listener, and serves the operational HTTP/WebSocket surface.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use marketsync::api;
use marketsync::app_state::AppState;
use marketsync::chain::{ChainReader, ContractMap, RpcTransport, Supervisor, SupervisorConfig};
use marketsync::config::SyncConfig;
use marketsync::domain::{EventBus, SyncStats};
use marketsync::reconcile::Reconciler;
use marketsync::store::PostgresMirrorStore;
use marketsync::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = SyncConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting marketsync");

    // The Mirror Store is the one collaborator startup cannot survive
    // without: everything downstream writes through it.
    let store = Arc::new(
        PostgresMirrorStore::connect(&config)
            .await
            .context("mirror store connection is required at startup")?,
    );
    store.ensure_schema().await.context("schema setup failed")?;

    let bus = EventBus::new(config.event_bus_capacity);
    let stats = Arc::new(SyncStats::new());

    let contracts = ContractMap::from_config(&config);
    if contracts.is_empty() {
        tracing::warn!("no contract addresses configured; chain listening disabled");
    }

    // Bounded queue between the supervised reader and the reconciler so a
    // slow store write backpressures instead of stalling the transport.
    let (events_tx, events_rx) = tokio::sync::mpsc::channel(config.event_queue_capacity);

    let reconciler = Reconciler::new(Arc::clone(&store), bus.clone(), Arc::clone(&stats));
    tokio::spawn(reconciler.run(events_rx));

    let (supervisor, connection) = Supervisor::new(
        Arc::clone(&store),
        events_tx,
        bus.clone(),
        Arc::clone(&stats),
        SupervisorConfig::from_sync(&config),
    );
    {
        let ws_url = config.rpc_ws_url.clone();
        let contracts = contracts.clone();
        let bus = bus.clone();
        let stats = Arc::clone(&stats);
        tokio::spawn(supervisor.run(move || {
            let ws_url = ws_url.clone();
            let contracts = contracts.clone();
            let bus = bus.clone();
            let stats = Arc::clone(&stats);
            async move {
                let transport = RpcTransport::connect(&ws_url).await?;
                Ok(ChainReader::new(Arc::new(transport), contracts, bus, stats))
            }
        }));
    }

    // Build application state
    let app_state = AppState {
        store,
        bus,
        stats,
        connection,
        started_at: chrono::Utc::now(),
    };

    // Build router
    let app = Router::new()
        .merge(api::router())
        .route("/ws", get(ws_handler::<PostgresMirrorStore>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
