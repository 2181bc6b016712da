//! Request and response bodies for the REST API.

use nls_core::Metadata;
use nls_pipeline::{BulkIndexReport, SearchResult};
use serde::{Deserialize, Serialize};

/// Request body for `POST /search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    /// Natural-language query.
    pub text: String,
    /// Provider name; the configured default when absent.
    #[serde(default)]
    pub provider: Option<String>,
    /// Result limit; the configured default when absent or zero.
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Response body for `POST /search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Hits, highest score first.
    pub results: Vec<SearchResult>,
}

/// Request body for `POST /index`.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexRequest {
    /// Raw document identifier; normalized before storage.
    pub id: String,
    /// Text to embed.
    pub content: String,
    /// Optional metadata.
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Request body for `PUT /documents/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRequest {
    /// Replacement text.
    pub content: String,
    /// Replacement metadata.
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Response body for single-document writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Always `true`; failures are reported as errors.
    pub success: bool,
}

impl SuccessResponse {
    pub(crate) fn ok() -> Self {
        Self { success: true }
    }
}

/// Response body for `POST /bulk-index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkIndexResponse {
    /// Documents persisted.
    pub indexed_count: usize,
    /// Records dropped with a recoverable error.
    pub error_count: usize,
    /// Wall-clock seconds.
    pub elapsed_time: f64,
    /// Documents per second.
    pub rate: f64,
    /// Error messages, the fatal one last if the run stopped early.
    pub errors: Vec<String>,
}

impl From<BulkIndexReport> for BulkIndexResponse {
    fn from(report: BulkIndexReport) -> Self {
        Self {
            indexed_count: report.indexed_count,
            error_count: report.error_count,
            elapsed_time: report.elapsed_time,
            rate: report.rate,
            errors: report.errors,
        }
    }
}
