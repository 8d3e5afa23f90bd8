//! engram-server - REST API server for engram.
//!
//! A thin axum surface over [`engram_core::Engine`].
//!
//! # Example
//!
//! ```ignore
//! use engram_core::{Engine, EngineConfig};
//! use engram_server::{create_server, AppState};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Engine::builder(EngineConfig::default()).build().await.unwrap();
//!     let app = create_server(AppState::new(engine));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod error;
pub mod factory;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use factory::create_engine;
pub use state::AppState;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

/// Create the server with all routes and middleware.
pub fn create_server(state: AppState) -> Router {
    routes::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors_layer())
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}
