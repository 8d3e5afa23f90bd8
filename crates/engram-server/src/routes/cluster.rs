//! Cluster endpoint.

use axum::{extract::State, Json};
use engram_core::{ClusterOptions, ClusterReport};
use tokio_util::sync::CancellationToken;

use crate::error::ApiResult;
use crate::state::AppState;

/// Run DBSCAN over the graph. The analysis is cancelled if the client
/// disconnects.
/// POST /cluster
pub async fn cluster(
    State(state): State<AppState>,
    options: Option<Json<ClusterOptions>>,
) -> ApiResult<Json<ClusterReport>> {
    let options = options.map(|Json(o)| o).unwrap_or_default();
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let report = state.engine.cluster(options, cancel).await?;
    Ok(Json(report))
}
