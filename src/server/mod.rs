//! HTTP and Server-Sent Events binding for the orchestrator.
//!
//! Thin adapter: every handler decodes a request, calls one
//! [`Orchestrator`] operation and encodes the result. Errors map to status
//! codes through [`TagplayError`]'s `IntoResponse` impl.
//!
//! Calls that reach the asset folder or the mapping file run on the
//! blocking pool so open event streams keep being served.

mod extract;
mod handlers;
mod response;
mod sse;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::broadcast::BroadcastConfig;
use crate::config::ServerConfig;
use crate::error::{Result, TagplayError};
use crate::mapping::FileResolver;
use crate::orchestrator::{Orchestrator, OrchestratorOptions};
use crate::storage::DirStorage;

pub use extract::ApiJson;
pub use handlers::{NavigateRequest, PlayRequest};

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub const fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Run `f` against the orchestrator on the blocking pool.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Orchestrator) -> T + Send + 'static,
        T: Send + 'static,
    {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::task::spawn_blocking(move || f(&orchestrator))
            .await
            .map_err(|e| TagplayError::Internal(format!("Blocking task failed: {e}")))
    }
}

/// Build the route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/status", get(handlers::status))
        .route("/assets", get(handlers::list_assets))
        .route("/assets/{filename}", get(handlers::asset_bytes))
        .route("/current-asset", get(handlers::current_asset))
        .route("/scanned-cards", get(handlers::scanned_cards))
        .route("/unknown-cards", get(handlers::unknown_cards))
        .route("/card-assets", get(handlers::card_assets))
        .route("/events", get(sse::events))
        .route("/play", post(handlers::play))
        .route("/navigate", post(handlers::navigate))
        .route("/card-removed", post(handlers::card_removed))
        .route("/unknown-card", post(handlers::unknown_card))
        .route("/refresh-mapping", post(handlers::refresh_mapping))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wire an orchestrator from `config`.
pub fn build_orchestrator(config: &ServerConfig) -> Result<Arc<Orchestrator>> {
    let storage = Arc::new(DirStorage::new(&config.assets.folder)?);
    let resolver = Arc::new(FileResolver::new(&config.mapping.file));
    Ok(Arc::new(Orchestrator::new(
        resolver,
        storage,
        OrchestratorOptions {
            broadcast: BroadcastConfig::from(&config.events),
            chunk_size: config.media.chunk_size,
        },
    )))
}

/// Run the server until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let orchestrator = build_orchestrator(&config)?;
    let reaper = orchestrator
        .broadcaster()
        .spawn_reaper(config.events.reap_interval());

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| TagplayError::ServerFailed {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;
    let local = listener.local_addr()?;

    info!(
        addr = %local,
        assets = %config.assets.folder.display(),
        mapping = %config.mapping.file.display(),
        "Asset server listening"
    );

    let app = router(AppState::new(orchestrator));
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    reaper.abort();
    result.map_err(|e| TagplayError::ServerFailed {
        addr: local.to_string(),
        reason: e.to_string(),
    })?;

    info!("Asset server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
