//! cslogs web server
//!
//! Streams container and host log files over HTTP as they grow.

use axum::{routing::get, Router};
use cslogs_core::{LogLayout, ServerConfig, TailConfig};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

mod handlers;
mod security;

pub use handlers::{ContainerLogQuery, INVALID_TYPE_MESSAGE};
pub use security::SECURITY_HEADERS;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    layout: Arc<LogLayout>,
    tail: TailConfig,
}

impl AppState {
    pub fn new(layout: LogLayout, tail: TailConfig) -> Self {
        Self {
            layout: Arc::new(layout),
            tail,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.layout(), config.tail)
    }
}

/// Create the log streaming router
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route(
            "/logs/applications/:application/containers/:container",
            get(handlers::container_logs),
        )
        .route("/logs/hosts/:host", get(handlers::host_logs))
        .route("/health", get(handlers::health_check));

    security::with_security_headers(router)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
///
/// Open log streams never finish on their own, so shutdown drops them rather
/// than waiting for clients to disconnect.
pub async fn start_server<F>(config: &ServerConfig, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    let app = create_router(AppState::from_config(config));
    let bind_addr = config
        .bind_addr()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Containership-Logs listening on {}", listener.local_addr()?);
    info!("Serving logs from {}", config.base_log_dir.display());

    tokio::select! {
        result = axum::serve(listener, app).into_future() => result?,
        _ = shutdown => info!("Closing open log streams"),
    }

    Ok(())
}
