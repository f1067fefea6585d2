use axum::extract::State;
use axum::response::Json;
use pathdb_protocol::{HealthResponse, InfoResponse};

use crate::state::AppState;

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<InfoResponse> {
    let config = &state.config;
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").into(),
        default_page_size: config.meta.default_page_size,
        max_page_size: config.meta.max_page_size,
        default_recurse: config.default_recurse,
        rpc_addr: config.rpc_addr.to_string(),
    })
}
