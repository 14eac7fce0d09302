//! Web server adapter.
//!
//! JSON admin API over Axum for managing price levels and browsing the
//! signal history. Ports are shared with the rest of the process behind
//! `Arc`.

mod error;
mod handlers;

pub use error::{status_from_error, WebError};
pub use handlers::*;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::domain::error::LevelwatchError;
use crate::ports::level_port::LevelPort;
use crate::ports::signal_port::SignalPort;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

pub struct AppState {
    pub levels: Arc<dyn LevelPort + Send + Sync>,
    pub signals: Arc<dyn SignalPort + Send + Sync>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/levels",
            get(handlers::list_levels).post(handlers::create_level),
        )
        .route(
            "/api/levels/{id}",
            put(handlers::update_level).delete(handlers::delete_level),
        )
        .route("/api/signals", get(handlers::list_signals))
        .route("/api/signal_history", get(handlers::list_signals))
        .route("/api/detect", post(handlers::run_detect))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), LevelwatchError> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "web server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
