//! Watched address endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::api::server::SharedAppState;
use crate::api::validation::{validate_address, ApiError};

#[derive(Debug, Deserialize)]
pub struct AddAddressRequest {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddAddressResponse {
    pub address: String,
    /// False if the address was already watched
    pub added: bool,
}

/// GET /api/addresses
pub async fn handle_list_addresses(State(state): State<SharedAppState>) -> impl IntoResponse {
    let addresses = state.watcher.watched_addresses().await;
    Json(serde_json::json!({
        "count": addresses.len(),
        "addresses": addresses
    }))
}

/// POST /api/addresses
///
/// Start watching an address. Deposits to it are reported from the next
/// poll cycle on.
pub async fn handle_add_address(
    State(state): State<SharedAppState>,
    Json(req): Json<AddAddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_address(&req.address).into_result()?;

    let added = state.watcher.add_watched_address(req.address.clone()).await;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };

    Ok((
        status,
        Json(AddAddressResponse {
            address: req.address,
            added,
        }),
    ))
}
