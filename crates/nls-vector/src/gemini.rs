//! Gemini embedding provider.
//!
//! Calls the Generative Language `embedContent` method and reads
//! `embedding.values`.

use async_trait::async_trait;
use nls_core::{Error, Result};
use serde_json::json;

use crate::embedding::{EmbeddingProvider, single_vector};
use crate::http;
use crate::types::{ProviderConfig, ProviderKind};

const DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `embedContent` client.
#[derive(Debug)]
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: Option<usize>,
}

impl GeminiProvider {
    /// Build a provider from its registry entry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `api_key` is missing.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::config("Provider 'gemini' requires api_key"))?;
        let kind = ProviderKind::Gemini;
        let model = config.model_or_default(kind);
        let provider = Self {
            client: http::client(config.timeout(kind))?,
            base_url: http::base_url(config.url.as_deref(), DEFAULT_URL),
            api_key,
            model: model.trim_start_matches("models/").to_string(),
            dimension: config.vector_size,
        };
        log::info!("Initialized Gemini provider with model {}", provider.model);
        Ok(provider)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = self
            .client
            .post(format!(
                "{}/models/{}:embedContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "model": format!("models/{}", self.model),
                "content": { "parts": [{ "text": text }] },
            }));

        let body = http::send_json(request, "Gemini").await?;

        let values = body
            .get("embedding")
            .and_then(|e| e.get("values"))
            .ok_or_else(|| Error::provider("Missing embedding.values in Gemini response"))?;
        single_vector(values, "Gemini")
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nls_core::ErrorKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(url: &str) -> GeminiProvider {
        GeminiProvider::from_config(&ProviderConfig {
            api_key: Some("g-key".to_string()),
            url: Some(url.to_string()),
            model: Some("models/text-embedding-004".to_string()),
            ..ProviderConfig::enabled(ProviderKind::Gemini)
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_embed_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/text-embedding-004:embedContent"))
            .and(header("x-goog-api-key", "g-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"embedding": {"values": [1.0, 0.0]}})),
            )
            .mount(&server)
            .await;

        let v = provider(&server.uri()).embed("hello").await.unwrap();
        assert_eq!(v, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_embed_empty_values() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"embedding": {"values": []}})),
            )
            .mount(&server)
            .await;

        let err = provider(&server.uri()).embed("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
    }

    #[test]
    fn test_requires_api_key() {
        let err = GeminiProvider::from_config(&ProviderConfig::enabled(ProviderKind::Gemini))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
