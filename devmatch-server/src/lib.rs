//! HTTP/JSON backend for devmatch: signup and login, profile editing, and the connection-request
//! workflow (send, ignore, accept, reject) over a sled store.

use std::net::SocketAddr;

use axum::{Extension, Router};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod profile;
pub mod routes;
pub mod state;
pub mod users;

pub use error::{AppError, Result};
pub use state::State;

pub fn app(state: State) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

/// Serves until Ctrl+C or SIGTERM, then flushes the store.
pub async fn serve(state: State) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    info!("listening on {addr}");
    axum::Server::bind(&addr)
        .serve(app(state.clone()).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    state.db.flush_async().await?;
    info!("store flushed, bye");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
