//! The service root.
//!
//! [`Services`] owns the long-lived provider registry, vector store and
//! record source, and the two pipelines built over them. It is constructed
//! once at startup and shared (cheaply cloned) by every request handler and
//! by the CLI's one-shot commands.

use nls_core::{Document, DocumentKey, Metadata, Result};
use nls_pipeline::{
    BulkIndexReport, BulkIndexRequest, IndexingPipeline, IndexingSettings, RecordSource,
    SearchPipeline, SearchResult, SearchSettings,
};
use nls_vector::{ProviderRegistry, VectorStore};
use serde::Serialize;
use std::sync::Arc;

/// Store status as reported by the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// `"ok"` when the store answered, `"degraded"` otherwise.
    pub status: String,
    /// Store backend name.
    pub store: String,
    /// Vector dimension the store is bound to.
    pub dimension: usize,
    /// Stored document count, when the backend can report it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_count: Option<usize>,
}

/// Shared handles for one deployment: one store, one dimension.
#[derive(Clone)]
pub struct Services {
    providers: Arc<ProviderRegistry>,
    store: Arc<dyn VectorStore>,
    source: Arc<dyn RecordSource>,
    indexing: IndexingPipeline,
    search: SearchPipeline,
}

impl Services {
    /// Wire the pipelines over the given handles.
    pub fn new(
        providers: Arc<ProviderRegistry>,
        store: Arc<dyn VectorStore>,
        source: Arc<dyn RecordSource>,
        indexing: IndexingSettings,
        search: SearchSettings,
    ) -> Self {
        let indexing = IndexingPipeline::new(providers.clone(), store.clone(), indexing);
        let search = SearchPipeline::new(providers.clone(), store.clone(), search);
        Self {
            providers,
            store,
            source,
            indexing,
            search,
        }
    }

    /// The provider registry.
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// The vector store.
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Run a search.
    pub async fn search(
        &self,
        text: &str,
        provider: Option<&str>,
        max_results: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        self.search.search(text, provider, max_results).await
    }

    /// Index one document under the normalized form of `raw_id`.
    pub async fn index(
        &self,
        raw_id: &str,
        content: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> Result<DocumentKey> {
        let doc = build_document(raw_id, content, metadata)?;
        self.indexing.index(doc).await
    }

    /// Replace the document stored under the normalized form of `raw_id`.
    pub async fn update(
        &self,
        raw_id: &str,
        content: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> Result<DocumentKey> {
        let doc = build_document(raw_id, content, metadata)?;
        self.indexing.update(doc).await
    }

    /// Delete the document stored under the normalized form of `raw_id`.
    ///
    /// Deleting a key that was never indexed succeeds.
    pub async fn delete(&self, raw_id: &str) -> Result<DocumentKey> {
        let key = DocumentKey::normalize(raw_id);
        self.indexing.delete(&key).await?;
        Ok(key)
    }

    /// Run a bulk ingestion from the configured record source.
    pub async fn bulk_index(&self, request: &BulkIndexRequest) -> Result<BulkIndexReport> {
        self.indexing.bulk_index(self.source.as_ref(), request).await
    }

    /// Probe the store.
    pub async fn health(&self) -> HealthReport {
        let (status, document_count) = match self.store.count().await {
            Ok(count) => ("ok", count),
            Err(e) => {
                tracing::warn!(error = %e, "Store health probe failed");
                ("degraded", None)
            }
        };
        HealthReport {
            status: status.to_string(),
            store: self.store.name().to_string(),
            dimension: self.store.dimension(),
            document_count,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("providers", &self.providers)
            .field("store", &self.store.name())
            .field("source", &self.source.name())
            .finish()
    }
}

fn build_document(
    raw_id: &str,
    content: impl Into<String>,
    metadata: Option<Metadata>,
) -> Result<Document> {
    let doc = Document::new(raw_id, content)?;
    Ok(match metadata {
        Some(metadata) => doc.with_metadata(metadata),
        None => doc,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nls_core::ErrorKind;
    use nls_pipeline::MemoryRecordSource;
    use nls_vector::{MemoryVectorStore, MockEmbeddingProvider};
    use serde_json::json;

    const DIM: usize = 8;

    fn services() -> Services {
        let providers = Arc::new(
            ProviderRegistry::new().with_provider("mock", Arc::new(MockEmbeddingProvider::new(DIM))),
        );
        Services::new(
            providers,
            Arc::new(MemoryVectorStore::new(DIM)),
            Arc::new(MemoryRecordSource::new()),
            IndexingSettings::new("mock"),
            SearchSettings::new("mock"),
        )
    }

    #[tokio::test]
    async fn test_index_then_get_with_metadata() {
        let svc = services();
        let mut metadata = Metadata::new();
        metadata.insert("price".into(), json!({"$numberDecimal": "1.5"}));

        let key = svc.index("doc-1", "hello", Some(metadata)).await.unwrap();
        let stored = svc.store().get(&key).await.unwrap().unwrap();
        assert_eq!(stored.content, "hello");
        assert_eq!(stored.metadata["price"], json!(1.5));
    }

    #[tokio::test]
    async fn test_update_replaces_content() {
        let svc = services();
        let key = svc.index("doc-1", "first", None).await.unwrap();
        let updated = svc.update("doc-1", "second", None).await.unwrap();
        assert_eq!(key, updated);

        let stored = svc.store().get(&key).await.unwrap().unwrap();
        assert_eq!(stored.content, "second");
    }

    #[tokio::test]
    async fn test_delete_uses_normalized_key() {
        let svc = services();
        let key = svc.index("abc-not-a-uuid", "hello", None).await.unwrap();
        assert_eq!(svc.delete("abc-not-a-uuid").await.unwrap(), key);
        assert!(svc.store().get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_index_rejects_empty_content() {
        let err = services().index("doc-1", "  ", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_health_reports_count() {
        let svc = services();
        svc.index("a", "x", None).await.unwrap();

        let health = svc.health().await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.store, "memory");
        assert_eq!(health.dimension, DIM);
        assert_eq!(health.document_count, Some(1));
    }
}
