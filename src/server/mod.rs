//! HTTP server for the advice API.
//!
//! # Endpoints
//!
//! - `GET  /health`                 - Liveness probe
//! - `GET  /philosophy-mix`         - Tradition weights
//! - `POST /advice`                 - Generate advice
//! - `GET  /conversations/:user_id` - Caller's conversation log
//! - `GET  /stats`                  - Usage counts

pub mod routes;

pub use routes::{app_router, ApiError, AppState};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

/// Bind `host:port` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn run(host: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let bind_addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    serve(listener, state).await
}

/// Serve on an already-bound listener until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!(%addr, "babushka listening");

    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
