//! Health and monitoring endpoints

use axum::{extract::State, response::IntoResponse, Json};

use crate::api::server::SharedAppState;

/// GET /api/health
pub async fn handle_health(State(state): State<SharedAppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "deposit-watcher",
        "version": env!("CARGO_PKG_VERSION"),
        "polling": state.watcher.is_running()
    }))
}

/// GET /api/stats
///
/// Watcher counters: cycles, deposits by kind, cursor and registry sizes.
pub async fn handle_stats(State(state): State<SharedAppState>) -> impl IntoResponse {
    let stats = state.watcher.stats().await;
    Json(serde_json::json!({
        "stats": stats,
        "sse_clients": state.broadcaster.client_count()
    }))
}
