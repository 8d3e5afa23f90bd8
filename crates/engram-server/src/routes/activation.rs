//! Activation snapshot endpoint.

use axum::{
    extract::{Query, State},
    Json,
};
use engram_core::NodeSnapshot;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    /// Return only the most active nodes.
    pub limit: Option<usize>,
}

/// Activation levels, most active first.
/// GET /activation
pub async fn activation_snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> ApiResult<Json<Vec<NodeSnapshot>>> {
    let mut nodes = state.engine.activation_snapshot()?;
    if let Some(limit) = query.limit {
        nodes.truncate(limit);
    }
    Ok(Json(nodes))
}
