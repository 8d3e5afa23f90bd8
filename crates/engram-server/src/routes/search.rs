//! Search endpoint.

use axum::{extract::State, Json};
use engram_core::{SearchOptions, SearchResponse};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// Request body for a search. Option fields sit next to the query.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Run without boosting activation, whatever `boost_on_read` says.
    #[serde(default)]
    pub peek: bool,
    #[serde(flatten)]
    pub options: SearchOptions,
}

/// Hybrid search.
/// POST /search
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let response = if request.peek {
        state.engine.peek(&request.query, &request.options).await?
    } else {
        state.engine.search(&request.query, &request.options).await?
    };
    Ok(Json(response))
}
