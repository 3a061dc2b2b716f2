//! HTTP server for CoorAgent (axum).
//!
//! Response bodies are newline-delimited JSON streams; `/v1/workflow` streams
//! the run's events as they happen, the management endpoints stream one
//! record per line.
//!
//! **Public API**: [`build_state`], [`router`], [`run_serve`],
//! [`run_serve_on_listener`].

mod app;
mod routes;

pub use app::{build_state, router, AppState};

use tokio::net::TcpListener;
use tracing::info;

/// Runs the server on an existing listener. Tests bind `127.0.0.1:0` and
/// pass the listener in.
pub async fn run_serve_on_listener(
    listener: TcpListener,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("cooragent server listening on http://{}", addr);
    let app = router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Binds the configured address and serves until the process exits.
pub async fn run_serve(
    settings: config::Settings,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = settings.server.addr();
    let state = build_state(&settings)?;
    let listener = TcpListener::bind(&addr).await?;
    run_serve_on_listener(listener, state).await
}
