//! Embedding provider trait and mock implementation.
//!
//! This module defines the `EmbeddingProvider` trait that abstracts over
//! different embedding generation backends (OpenAI, Ollama, Gemini,
//! fastembed).
//!
//! # Providers
//!
//! - `MockEmbeddingProvider`: Deterministic fixed-dimension vectors for testing
//! - `OpenAiProvider`, `OllamaProvider`, `GeminiProvider`: hosted HTTP APIs
//! - `FastEmbedProvider`: Local embedding via fastembed (requires `provider-fastembed` feature)
//!
//! A provider never turns a failure into a zero or empty vector: an empty,
//! non-numeric or otherwise malformed upstream result is a provider error.

use async_trait::async_trait;
use nls_core::{Error, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for generating text embeddings.
///
/// Implementations wrap specific embedding APIs and provide a uniform async
/// interface. The trait requires `Send + Sync` so a single provider handle
/// can serve concurrent requests.
///
/// The returned vector length is provider and model dependent. Callers
/// compare it against the store dimension themselves.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts.
    ///
    /// Default implementation calls `embed` for each text sequentially.
    /// Backends that support native batching should override this.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The declared embedding dimension, when known up front.
    fn dimension(&self) -> Option<usize>;

    /// The provider name for diagnostics.
    fn name(&self) -> &str;
}

// ============================================================================
// Response validation
// ============================================================================

/// Extract exactly one embedding vector from a JSON value.
///
/// Accepts a flat numeric array, or a nested array holding exactly one
/// numeric array. More than one vector for a single input is an error.
pub fn single_vector(value: &Value, provider: &str) -> Result<Vec<f32>> {
    let items = value.as_array().ok_or_else(|| {
        Error::provider(format!("{provider}: embedding is not an array"))
    })?;

    if let Some(Value::Array(_)) = items.first() {
        if items.len() > 1 {
            return Err(Error::provider(format!(
                "{provider}: expected one embedding for a single input, got {}",
                items.len()
            )));
        }
        return single_vector(&items[0], provider);
    }

    let vector = items
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect::<Option<Vec<f32>>>()
        .ok_or_else(|| Error::provider(format!("{provider}: embedding has non-numeric values")))?;

    validate_vector(vector, provider)
}

/// Reject empty vectors and vectors with non-finite components.
pub fn validate_vector(vector: Vec<f32>, provider: &str) -> Result<Vec<f32>> {
    if vector.is_empty() {
        return Err(Error::provider(format!("{provider}: empty embedding returned")));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(Error::provider(format!(
            "{provider}: embedding has non-finite values"
        )));
    }
    log::debug!("{provider}: validated embedding of size {}", vector.len());
    Ok(vector)
}

// ============================================================================
// Mock provider
// ============================================================================

/// A mock embedding provider for testing.
///
/// Generates deterministic vectors based on the input text hash.
/// Each component is derived from the text bytes, producing consistent
/// embeddings for the same input. Failures can be scripted: the first
/// `n` calls, or every text containing a marker.
pub struct MockEmbeddingProvider {
    dimension: usize,
    name: String,
    transient_failures: AtomicUsize,
    fail_marker: Option<String>,
    calls: AtomicUsize,
}

impl MockEmbeddingProvider {
    /// Create a new mock provider with the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            name: "mock".to_string(),
            transient_failures: AtomicUsize::new(0),
            fail_marker: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Override the reported provider name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fail the first `n` calls with a provider error.
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Always fail for texts containing `marker`.
    pub fn with_fail_marker(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    /// Number of `embed` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Generate a deterministic embedding from text.
    fn deterministic_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        let bytes = text.as_bytes();

        for (i, val) in embedding.iter_mut().enumerate() {
            // Use byte values to create deterministic but varied components
            let byte_idx = i % bytes.len().max(1);
            let byte_val = if bytes.is_empty() {
                0u8
            } else {
                bytes[byte_idx]
            };
            *val = ((byte_val as f32 + i as f32) % 256.0) / 256.0;
        }

        // Normalize to unit vector
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut embedding {
                *val /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::provider(format!("{}: scripted failure", self.name)));
        }
        if let Some(marker) = &self.fail_marker
            && text.contains(marker.as_str())
        {
            return Err(Error::provider(format!(
                "{}: refused text containing '{marker}'",
                self.name
            )));
        }
        Ok(self.deterministic_embedding(text))
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Tests
// ============================================================================
