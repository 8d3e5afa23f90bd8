//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub items: usize,
    pub semantic_enabled: bool,
    pub uptime_secs: u64,
}

/// Health check endpoint.
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let items = state.engine.item_count()?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        items,
        semantic_enabled: state.engine.semantic_enabled(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}
