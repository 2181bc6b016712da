//! HTTP request handlers.

use axum::Json;
use axum::extract::{Path, State};
use nls_pipeline::BulkIndexRequest;

use crate::api::errors::ApiError;
use crate::api::models::*;
use crate::services::{HealthReport, Services};

/// `POST /search`
pub async fn search(
    State(services): State<Services>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let results = services
        .search(&req.text, req.provider.as_deref(), req.max_results)
        .await?;
    Ok(Json(SearchResponse { results }))
}

/// `POST /index`
pub async fn index_document(
    State(services): State<Services>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let key = services.index(&req.id, req.content, req.metadata).await?;
    tracing::info!(id = %req.id, %key, "Indexed document");
    Ok(Json(SuccessResponse::ok()))
}

/// `POST /bulk-index`
pub async fn bulk_index(
    State(services): State<Services>,
    Json(req): Json<BulkIndexRequest>,
) -> Result<Json<BulkIndexResponse>, ApiError> {
    let report = services.bulk_index(&req).await?;
    if let Some(fatal) = &report.fatal_error {
        tracing::error!(collection = %req.collection_name, error = %fatal, "Bulk run stopped early");
    }
    Ok(Json(report.into()))
}

/// `DELETE /documents/{id}`
pub async fn delete_document(
    State(services): State<Services>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let key = services.delete(&id).await?;
    tracing::info!(%id, %key, "Deleted document");
    Ok(Json(SuccessResponse::ok()))
}

/// `PUT /documents/{id}`
pub async fn update_document(
    State(services): State<Services>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let key = services.update(&id, req.content, req.metadata).await?;
    tracing::info!(%id, %key, "Updated document");
    Ok(Json(SuccessResponse::ok()))
}

/// `GET /health`
pub async fn health(State(services): State<Services>) -> Result<Json<HealthReport>, ApiError> {
    let report = services.health().await;
    if report.status != "ok" {
        return Err(ApiError::ServiceUnavailable(format!(
            "{} store is not responding",
            report.store
        )));
    }
    Ok(Json(report))
}
