//! Ollama embedding provider.
//!
//! Calls `POST {url}/api/embed` with `{model, input}` and reads the
//! `embeddings` field. Ollama answers with a list of vectors even for a
//! single input; exactly one is expected.

use async_trait::async_trait;
use nls_core::{Error, Result};
use serde_json::json;

use crate::embedding::{EmbeddingProvider, single_vector};
use crate::http;
use crate::types::{ProviderConfig, ProviderKind};

const DEFAULT_URL: &str = "http://localhost:11434";

/// Ollama `/api/embed` client.
#[derive(Debug)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: Option<usize>,
}

impl OllamaProvider {
    /// Build a provider from its registry entry.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let kind = ProviderKind::Ollama;
        let provider = Self {
            client: http::client(config.timeout(kind))?,
            base_url: http::base_url(config.url.as_deref(), DEFAULT_URL),
            model: config.model_or_default(kind),
            dimension: config.vector_size,
        };
        log::info!(
            "Initialized Ollama provider with model {} at {}",
            provider.model,
            provider.base_url
        );
        Ok(provider)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        log::debug!("Sending embed request to Ollama model {}", self.model);
        let request = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&json!({ "model": self.model, "input": text }));

        let body = http::send_json(request, "Ollama").await?;

        let embeddings = body.get("embeddings").ok_or_else(|| {
            Error::provider(format!("No embedding found in Ollama response: {body}"))
        })?;
        single_vector(embeddings, "Ollama")
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
