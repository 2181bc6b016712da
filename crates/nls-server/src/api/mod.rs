//! REST API layer built on Axum.

/// API error type mapped to HTTP status codes.
pub mod errors;
/// HTTP request handlers.
pub mod handlers;
/// Request and response bodies.
pub mod models;

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::services::Services;

/// Build the router over a service root.
pub fn create_router(services: Services) -> Router {
    Router::new()
        .route("/search", post(handlers::search))
        .route("/index", post(handlers::index_document))
        .route("/bulk-index", post(handlers::bulk_index))
        .route(
            "/documents/{id}",
            axum::routing::delete(handlers::delete_document).put(handlers::update_document),
        )
        .route("/health", get(handlers::health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(services)
}
