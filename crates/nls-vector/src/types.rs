//! Configuration types for providers and stores.
//!
//! These are plain serde structs so that the CLI's config loader can embed
//! them directly in its own config tree.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fallback vector size when neither the store nor the default provider
/// declares one.
pub const DEFAULT_VECTOR_SIZE: usize = 1536;

// ============================================================================
// Providers
// ============================================================================

/// The backend a provider entry talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
    /// Ollama `/api/embed` endpoint.
    Ollama,
    /// Google Generative Language `embedContent` endpoint.
    Gemini,
    /// Local models via fastembed.
    FastEmbed,
    /// Deterministic in-process vectors.
    Mock,
}

impl ProviderKind {
    /// Parse a kind from its config name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "ollama" => Some(Self::Ollama),
            "gemini" => Some(Self::Gemini),
            "fastembed" => Some(Self::FastEmbed),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }

    /// Default model for this kind.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "text-embedding-3-small",
            Self::Ollama => "nomic-embed-text",
            Self::Gemini => "embedding-001",
            Self::FastEmbed => "bge-small-en-v1.5",
            Self::Mock => "mock",
        }
    }

    /// Default HTTP timeout for this kind.
    pub fn default_timeout(self) -> Duration {
        match self {
            Self::Ollama => Duration::from_secs(120),
            _ => Duration::from_secs(60),
        }
    }
}

/// One entry of the `[providers.<name>]` registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Disabled providers are known but refuse selection.
    #[serde(default)]
    pub enabled: bool,

    /// Backend kind; defaults to the entry's name (`openai`, `ollama`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProviderKind>,

    /// API credential, for hosted backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier.
    #[serde(
        default,
        alias = "embedding_model",
        skip_serializing_if = "Option::is_none"
    )]
    pub model: Option<String>,

    /// Base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Declared embedding length, used to size the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_size: Option<usize>,

    /// Per-request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Model cache directory (fastembed only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<String>,
}

impl ProviderConfig {
    /// An enabled entry of the given kind.
    pub fn enabled(kind: ProviderKind) -> Self {
        Self {
            enabled: true,
            kind: Some(kind),
            ..Default::default()
        }
    }

    /// Resolve the backend kind, falling back to the registry entry name.
    pub fn resolve_kind(&self, name: &str) -> Option<ProviderKind> {
        self.kind.or_else(|| ProviderKind::from_name(name))
    }

    /// The configured model, or the kind's default.
    pub fn model_or_default(&self, kind: ProviderKind) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| kind.default_model().to_string())
    }

    /// The configured timeout, or the kind's default.
    pub fn timeout(&self, kind: ProviderKind) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| kind.default_timeout())
    }
}

// ============================================================================
// Stores
// ============================================================================

/// What to do when an existing collection has a different vector size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionPolicy {
    /// Refuse to start with a configuration error.
    #[default]
    Fail,
    /// Drop the collection and create it again with the configured size.
    Recreate,
}

/// The `[vector_db]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend type: `memory` or `qdrant`.
    #[serde(rename = "type", default = "default_store_type")]
    pub store_type: String,

    /// Connection URL (qdrant gRPC endpoint).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// API key for managed deployments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Collection holding the documents.
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Vector size; when unset it is taken from the default provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_size: Option<usize>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,

    /// Policy for a pre-existing collection of a different size.
    #[serde(default)]
    pub on_dimension_mismatch: DimensionPolicy,
}

fn default_store_type() -> String {
    "memory".to_string()
}

fn default_collection_name() -> String {
    "documents".to_string()
}

fn default_store_timeout_secs() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: default_store_type(),
            url: None,
            api_key: None,
            collection_name: default_collection_name(),
            vector_size: None,
            timeout_secs: default_store_timeout_secs(),
            on_dimension_mismatch: DimensionPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_from_name() {
        assert_eq!(ProviderKind::from_name("openai"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::from_name("Ollama"), Some(ProviderKind::Ollama));
        assert_eq!(ProviderKind::from_name("nope"), None);
    }

    #[test]
    fn test_provider_config_defaults() {
        let config: ProviderConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.enabled);
        assert!(config.kind.is_none());
        assert_eq!(config.resolve_kind("gemini"), Some(ProviderKind::Gemini));
        assert_eq!(
            config.model_or_default(ProviderKind::Ollama),
            "nomic-embed-text"
        );
        assert_eq!(
            config.timeout(ProviderKind::Ollama),
            Duration::from_secs(120)
        );
        assert_eq!(
            config.timeout(ProviderKind::OpenAi),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_provider_config_explicit_kind_and_alias() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{"enabled": true, "kind": "ollama", "embedding_model": "mxbai-embed-large"}"#,
        )
        .unwrap();
        assert_eq!(config.resolve_kind("local"), Some(ProviderKind::Ollama));
        assert_eq!(config.model.as_deref(), Some("mxbai-embed-large"));
    }

    #[test]
    fn test_store_config_defaults() {
        let config: StoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.store_type, "memory");
        assert_eq!(config.collection_name, "documents");
        assert_eq!(config.on_dimension_mismatch, DimensionPolicy::Fail);
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_store_config_type_field() {
        let config: StoreConfig = serde_json::from_str(
            r#"{"type": "qdrant", "url": "http://localhost:6334", "on_dimension_mismatch": "recreate"}"#,
        )
        .unwrap();
        assert_eq!(config.store_type, "qdrant");
        assert_eq!(config.on_dimension_mismatch, DimensionPolicy::Recreate);
    }
}
