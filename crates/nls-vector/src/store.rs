//! Vector store trait, shared validation, and the store factory.
//!
//! A store is bound to exactly one vector dimension for its lifetime. Every
//! write and every query is checked against it before the backend is
//! touched, and a mismatch is a validation error, never a store error.

use async_trait::async_trait;
use nls_core::{Document, DocumentKey, Error, Result};
use std::sync::Arc;

use crate::memory::MemoryVectorStore;
use crate::types::StoreConfig;

/// Persistence and similarity search over documents with embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The vector dimension this store was initialized with.
    fn dimension(&self) -> usize;

    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Upsert a document by key.
    ///
    /// Fails with a validation error if the embedding is missing, of the
    /// wrong length, or non-finite.
    async fn add(&self, doc: &Document) -> Result<()>;

    /// Upsert several documents.
    ///
    /// Every document is validated before any is written. Backends with a
    /// native bulk write should override this.
    async fn add_batch(&self, docs: &[Document]) -> Result<()> {
        for doc in docs {
            check_document(doc, self.dimension())?;
        }
        for doc in docs {
            self.add(doc).await?;
        }
        Ok(())
    }

    /// Same semantics as [`add`](Self::add).
    async fn update(&self, doc: &Document) -> Result<()> {
        self.add(doc).await
    }

    /// Remove a document. Deleting an absent key succeeds.
    async fn delete(&self, key: &DocumentKey) -> Result<()>;

    /// At most `limit` documents scoring at least `score_threshold`,
    /// highest score first.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<Document>>;

    /// Point lookup. An absent key is `Ok(None)`.
    async fn get(&self, key: &DocumentKey) -> Result<Option<Document>>;

    /// Number of stored documents, when the backend can tell cheaply.
    async fn count(&self) -> Result<Option<usize>> {
        Ok(None)
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Validate a document's embedding against the store dimension.
pub fn check_document(doc: &Document, dimension: usize) -> Result<&[f32]> {
    let embedding = doc
        .embedding
        .as_deref()
        .ok_or_else(|| Error::validation(format!("Document {} must have an embedding", doc.key)))?;

    if embedding.len() != dimension {
        return Err(Error::validation(format!(
            "Vector dimension mismatch: Got {}, expected {dimension}",
            embedding.len()
        )));
    }
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(Error::validation(format!(
            "Document {} has non-numeric embedding values",
            doc.key
        )));
    }
    Ok(embedding)
}

/// Validate a query vector against the store dimension.
pub fn check_query(vector: &[f32], dimension: usize) -> Result<()> {
    if vector.len() != dimension {
        return Err(Error::validation(format!(
            "Query vector dimension mismatch: Got {}, expected {dimension}",
            vector.len()
        )));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(Error::validation("Query vector has non-numeric values"));
    }
    Ok(())
}

/// Sort documents by descending score; missing scores sort last.
pub fn sort_by_score(docs: &mut [Document]) {
    docs.sort_by(|a, b| {
        let a = a.score.unwrap_or(f32::NEG_INFINITY);
        let b = b.score.unwrap_or(f32::NEG_INFINITY);
        b.total_cmp(&a)
    });
}

// ============================================================================
// Factory
// ============================================================================

/// Create the configured store, bound to `dimension`.
///
/// # Errors
///
/// Returns a configuration error for an unsupported `type` (or one whose
/// feature is not compiled in), and whatever the backend reports while
/// preparing its collection.
pub async fn create_vector_store(
    config: &StoreConfig,
    dimension: usize,
) -> Result<Arc<dyn VectorStore>> {
    if dimension == 0 {
        return Err(Error::config("Vector size must be greater than zero"));
    }
    log::info!(
        "Creating '{}' vector store with vector size {dimension}",
        config.store_type
    );
    match config.store_type.as_str() {
        "memory" => Ok(Arc::new(MemoryVectorStore::new(dimension))),
        #[cfg(feature = "store-qdrant")]
        "qdrant" => Ok(Arc::new(
            crate::qdrant::QdrantVectorStore::connect(config, dimension).await?,
        )),
        #[cfg(not(feature = "store-qdrant"))]
        "qdrant" => Err(Error::config(
            "Vector database type 'qdrant' requires the store-qdrant feature",
        )),
        other => Err(Error::config(format!(
            "Unsupported vector database type: {other}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nls_core::ErrorKind;

    #[test]
    fn test_check_document() {
        let doc = Document::new("a", "text").unwrap();
        let err = check_document(&doc, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let doc = doc.with_embedding(vec![0.1, 0.2]);
        let err = check_document(&doc, 3).unwrap_err();
        assert!(err.to_string().contains("Got 2, expected 3"));

        let doc = Document::new("a", "text")
            .unwrap()
            .with_embedding(vec![0.1, f32::NAN, 0.3]);
        assert!(check_document(&doc, 3).is_err());

        let doc = Document::new("a", "text")
            .unwrap()
            .with_embedding(vec![0.1, 0.2, 0.3]);
        assert_eq!(check_document(&doc, 3).unwrap().len(), 3);
    }

    #[test]
    fn test_check_query() {
        assert!(check_query(&[0.0, 1.0], 2).is_ok());
        let err = check_query(&[0.0], 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_sort_by_score() {
        let mut docs: Vec<Document> = [0.9, 0.95, 0.7]
            .iter()
            .enumerate()
            .map(|(i, s)| {
                Document::new(&i.to_string(), "t")
                    .unwrap()
                    .with_score(*s)
            })
            .collect();
        sort_by_score(&mut docs);
        let scores: Vec<f32> = docs.iter().filter_map(|d| d.score).collect();
        assert_eq!(scores, vec![0.95, 0.9, 0.7]);
    }

    #[tokio::test]
    async fn test_factory_memory() {
        let store = create_vector_store(&StoreConfig::default(), 8).await.unwrap();
        assert_eq!(store.dimension(), 8);
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn test_factory_unsupported_type() {
        let config = StoreConfig {
            store_type: "pinecone".to_string(),
            ..Default::default()
        };
        let err = create_vector_store(&config, 8).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("Unsupported vector database type: pinecone"));
    }

    #[tokio::test]
    async fn test_factory_zero_dimension() {
        let err = create_vector_store(&StoreConfig::default(), 0)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
