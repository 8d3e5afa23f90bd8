//! Item endpoints.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use engram_core::{Item, ItemKind};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

/// Request body for indexing an item.
#[derive(Debug, Deserialize)]
pub struct IndexItemRequest {
    /// Item id; generated when omitted.
    pub id: Option<String>,
    pub content: String,
    pub title: Option<String>,
    #[serde(default)]
    pub kind: ItemKind,
    #[serde(default)]
    pub relevance_score: f32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl From<IndexItemRequest> for Item {
    fn from(request: IndexItemRequest) -> Self {
        let mut item = match request.id {
            Some(id) => Item::new(id, request.content),
            None => Item::with_generated_id(request.content),
        };
        if let Some(title) = request.title {
            item = item.with_title(title);
        }
        item.with_kind(request.kind)
            .with_relevance(request.relevance_score)
            .with_metadata(request.metadata)
    }
}

#[derive(Debug, Serialize)]
pub struct IndexItemResponse {
    pub id: String,
}

/// Index an item.
/// POST /items
pub async fn index_item(
    State(state): State<AppState>,
    Json(request): Json<IndexItemRequest>,
) -> ApiResult<(StatusCode, Json<IndexItemResponse>)> {
    let item: Item = request.into();
    let id = item.id.clone();
    state.engine.index_item(item).await?;
    Ok((StatusCode::CREATED, Json(IndexItemResponse { id })))
}

/// Request body for recording an access.
#[derive(Debug, Default, Deserialize)]
pub struct AccessRequest {
    /// Activation boost; the configured access boost when omitted.
    pub boost: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub id: String,
    pub activation: f32,
}

/// Record an access to an item.
/// POST /items/:id/access
pub async fn access_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Option<Json<AccessRequest>>,
) -> ApiResult<Json<AccessResponse>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let activation = state.engine.access_item(&id, request.boost).await?;
    Ok(Json(AccessResponse { id, activation }))
}
