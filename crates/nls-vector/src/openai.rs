//! OpenAI embedding provider.
//!
//! Calls `POST {url}/embeddings` with a bearer token. Any OpenAI-compatible
//! server works by overriding `url`.

use async_trait::async_trait;
use nls_core::{Error, Result};
use serde_json::json;

use crate::embedding::{EmbeddingProvider, single_vector};
use crate::http;
use crate::types::{ProviderConfig, ProviderKind};

const DEFAULT_URL: &str = "https://api.openai.com/v1";

/// OpenAI `/embeddings` client.
#[derive(Debug)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: Option<usize>,
}

impl OpenAiProvider {
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
            .ok_or_else(|| Error::config("Provider 'openai' requires api_key"))?;
        let kind = ProviderKind::OpenAi;
        let provider = Self {
            client: http::client(config.timeout(kind))?,
            base_url: http::base_url(config.url.as_deref(), DEFAULT_URL),
            api_key,
            model: config.model_or_default(kind),
            dimension: config.vector_size,
        };
        log::info!("Initialized OpenAI provider with model {}", provider.model);
        Ok(provider)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": text }));

        let body = http::send_json(request, "OpenAI").await?;

        let data = body["data"]
            .as_array()
            .ok_or_else(|| Error::provider("Missing data in OpenAI response"))?;
        if data.len() != 1 {
            return Err(Error::provider(format!(
                "OpenAI: expected one embedding for a single input, got {}",
                data.len()
            )));
        }
        single_vector(&data[0]["embedding"], "OpenAI")
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nls_core::ErrorKind;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: Some("sk-test".to_string()),
            url: Some(url.to_string()),
            vector_size: Some(3),
            ..ProviderConfig::enabled(ProviderKind::OpenAi)
        }
    }

    #[test]
    fn test_requires_api_key() {
        let err = OpenAiProvider::from_config(&ProviderConfig::enabled(ProviderKind::OpenAi))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_embed_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(
                json!({"model": "text-embedding-3-small", "input": "hello"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::from_config(&config(&server.uri())).unwrap();
        let v = provider.embed("hello").await.unwrap();

        assert_eq!(v, vec![0.1, 0.2, 0.3]);
        assert_eq!(provider.dimension(), Some(3));
    }

    #[tokio::test]
    async fn test_embed_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::from_config(&config(&server.uri())).unwrap();
        let err = provider.embed("hello").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_embed_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "list"})))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::from_config(&config(&server.uri())).unwrap();
        let err = provider.embed("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
    }

    #[tokio::test]
    async fn test_embed_rejects_multiple_vectors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1]}, {"embedding": [0.2]}]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::from_config(&config(&server.uri())).unwrap();
        assert!(provider.embed("hello").await.is_err());
    }
}
