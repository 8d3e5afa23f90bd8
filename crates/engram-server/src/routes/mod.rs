//! Route definitions for the REST API.

mod activation;
mod cluster;
mod health;
mod items;
mod search;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Items
        .route("/items", post(items::index_item))
        .route("/items/:id/access", post(items::access_item))
        // Retrieval
        .route("/search", post(search::search))
        .route("/cluster", post(cluster::cluster))
        // Activation
        .route("/activation", get(activation::activation_snapshot))
        // Attach state
        .with_state(state)
}

pub use activation::*;
pub use cluster::*;
pub use health::*;
pub use items::*;
pub use search::*;
