//! Server bootstrap — wires the store, services, router, and background
//! daemon together and runs the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use labshare_auth::AdminDirectory;
use labshare_core::config::AppConfig;
use labshare_core::error::{AppError, ErrorKind};
use labshare_core::result::AppResult;
use labshare_store::DocumentStore;
use labshare_worker::retention_daemon;

use crate::router::build_router;
use crate::state::AppState;

/// Run the LabShare server until interrupted.
///
/// Opens the document store, bootstraps the default admin account,
/// starts the retention daemon, and serves the API. On Ctrl-C the
/// listener drains in-flight requests and the daemon is signalled and
/// awaited before returning.
pub async fn run_server(config: AppConfig) -> AppResult<()> {
    let config = Arc::new(config);

    let store = Arc::new(DocumentStore::open(config.data.data_path()).await?);
    info!(data_dir = %config.data.data_dir, "Opened document store");

    AdminDirectory::new(Arc::clone(&store))
        .ensure_default_admin()
        .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let daemon = tokio::spawn(retention_daemon(Arc::clone(&store), shutdown_rx));

    let state = AppState::new(Arc::clone(&config), store);
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::with_source(ErrorKind::Configuration, format!("Failed to bind {addr}"), e)
    })?;
    info!(%addr, "LabShare server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Internal, "Server error", e))?;

    info!("Shutting down, stopping retention daemon");
    let _ = shutdown_tx.send(true);
    let _ = daemon.await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Received shutdown signal");
}
