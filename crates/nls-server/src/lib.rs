//! HTTP façade for NLS Search.
//!
//! Exposes the search and indexing pipelines as a small JSON API:
//!
//! | Route | Operation |
//! |-------|-----------|
//! | `POST /search` | semantic search |
//! | `POST /index` | index one document |
//! | `POST /bulk-index` | ingest a source collection |
//! | `PUT /documents/{id}` | re-embed and replace one document |
//! | `DELETE /documents/{id}` | delete one document |
//! | `GET /health` | store status |

pub mod api;
pub mod services;

pub use api::create_router;
pub use services::{HealthReport, Services};

use std::net::SocketAddr;

/// Bind `addr` and serve the API until the process is stopped.
pub async fn serve(addr: SocketAddr, services: Services) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(services)).await
}
