//! API Server Module
//!
//! Provides the Axum application builder and server startup logic.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::routes::{addresses, health};
use super::sse::{sse_updates_handler, SseBroadcaster, DEFAULT_CAPACITY};
use crate::watcher::DepositWatcher;

/// Combined application state for all API endpoints
pub struct AppState {
    pub watcher: Arc<DepositWatcher>,
    /// Fan-out of deposit notifications to SSE clients
    pub broadcaster: Arc<SseBroadcaster>,
}

/// Shared application state type
pub type SharedAppState = Arc<AppState>;

impl AppState {
    /// Create application state and attach the SSE broadcaster to the watcher
    pub fn new(watcher: Arc<DepositWatcher>) -> SharedAppState {
        Self::with_capacity(watcher, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(watcher: Arc<DepositWatcher>, capacity: usize) -> SharedAppState {
        let broadcaster = Arc::new(SseBroadcaster::new(capacity));
        broadcaster.attach(&watcher);

        Arc::new(Self {
            watcher,
            broadcaster,
        })
    }

    /// Stop the watcher and stop feeding SSE clients. Returns how many
    /// broadcaster subscriptions were removed.
    pub async fn shutdown(&self) -> usize {
        let detached = self.broadcaster.detach(&self.watcher);
        self.watcher.shutdown().await;
        detached
    }
}

/// Build the router
pub fn create_router(state: SharedAppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health::handle_health))
        .route("/api/stats", get(health::handle_stats))
        .route(
            "/api/addresses",
            get(addresses::handle_list_addresses).post(addresses::handle_add_address),
        )
        .route("/updates", get(sse_updates_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(state: SharedAppState, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(
        address = %addr,
        endpoints = "GET /api/health, GET /api/stats, GET|POST /api/addresses, GET /updates",
        "deposit watcher API listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

// =============================================================================
// Tests
// =============================================================================
