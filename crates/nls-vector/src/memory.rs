//! In-memory vector store.
//!
//! Brute-force cosine similarity over a `HashMap`. Suitable for tests,
//! demos and small corpora; contents are lost on restart.

use async_trait::async_trait;
use nls_core::{Document, DocumentKey, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::store::{VectorStore, check_document, check_query, sort_by_score};

/// A `VectorStore` held entirely in process memory.
#[derive(Debug)]
pub struct MemoryVectorStore {
    dimension: usize,
    documents: RwLock<HashMap<DocumentKey, Document>>,
}

impl MemoryVectorStore {
    /// Create an empty store bound to `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            documents: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "memory"
    }

    async fn add(&self, doc: &Document) -> Result<()> {
        check_document(doc, self.dimension)?;
        let mut stored = doc.clone();
        stored.score = None;
        self.documents.write().await.insert(doc.key, stored);
        Ok(())
    }

    async fn delete(&self, key: &DocumentKey) -> Result<()> {
        self.documents.write().await.remove(key);
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<Document>> {
        check_query(vector, self.dimension)?;

        let documents = self.documents.read().await;
        let mut hits: Vec<Document> = documents
            .values()
            .filter_map(|doc| {
                let embedding = doc.embedding.as_deref()?;
                let score = cosine_similarity(vector, embedding);
                (score >= score_threshold).then(|| doc.clone().with_score(score))
            })
            .collect();

        sort_by_score(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get(&self, key: &DocumentKey) -> Result<Option<Document>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn count(&self) -> Result<Option<usize>> {
        Ok(Some(self.documents.read().await.len()))
    }
}

/// Cosine similarity; zero when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
