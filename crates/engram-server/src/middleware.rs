//! Middleware for the REST API server.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

/// CORS for the JSON API: any origin, GET/POST only.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Log each request against its route template.
///
/// Health probes log at debug, server errors at warn.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        warn!(%method, %route, status, duration_ms, "Request failed");
    } else if route == "/health" {
        debug!(%method, %route, status, duration_ms, "Health probe");
    } else {
        info!(%method, %route, status, duration_ms, "Request completed");
    }

    response
}
