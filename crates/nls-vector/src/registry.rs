//! Name-keyed registry of embedding providers.
//!
//! The registry is built once from the `[providers]` config table. Every
//! enabled entry is constructed eagerly, so a bad entry fails at startup
//! instead of on the first request. Disabled entries are remembered so
//! that selecting one reports "not enabled" rather than "unknown".

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use nls_core::{Error, Result};

use crate::embedding::{EmbeddingProvider, MockEmbeddingProvider};
use crate::gemini::GeminiProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::types::{DEFAULT_VECTOR_SIZE, ProviderConfig, ProviderKind};

/// Providers available for selection by name.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn EmbeddingProvider>>,
    disabled: BTreeSet<String>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct every enabled provider in `configs`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an enabled entry has an unknown
    /// kind or cannot be constructed.
    pub fn from_config(configs: &BTreeMap<String, ProviderConfig>) -> Result<Self> {
        let mut registry = Self::new();
        for (name, config) in configs {
            if !config.enabled {
                log::debug!("Provider '{name}' is configured but disabled");
                registry.disabled.insert(name.clone());
                continue;
            }
            let provider = create_provider(name, config)?;
            registry.register(name.clone(), provider);
        }
        log::info!("Registered embedding providers: {:?}", registry.names());
        Ok(registry)
    }

    /// Register (or replace) an enabled provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn EmbeddingProvider>) {
        let name = name.into();
        self.disabled.remove(&name);
        self.providers.insert(name, provider);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_provider(
        mut self,
        name: impl Into<String>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        self.register(name, provider);
        self
    }

    /// Record a known but disabled provider name.
    pub fn with_disabled(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.providers.remove(&name);
        self.disabled.insert(name);
        self
    }

    /// Select a provider by name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is unknown or disabled.
    pub fn get(&self, name: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        if let Some(provider) = self.providers.get(name) {
            return Ok(provider.clone());
        }
        if self.disabled.contains(name) {
            return Err(Error::config(format!("Provider {name} is not enabled")));
        }
        Err(Error::config(format!("Unknown provider: {name}")))
    }

    /// Names of the enabled providers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether no provider is enabled.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("enabled", &self.names())
            .field("disabled", &self.disabled)
            .finish()
    }
}

/// Construct one provider from its registry entry.
pub fn create_provider(name: &str, config: &ProviderConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let kind = config
        .resolve_kind(name)
        .ok_or_else(|| Error::config(format!("Unknown provider: {name}")))?;

    let provider: Arc<dyn EmbeddingProvider> = match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(config)?),
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_config(config)?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_config(config)?),
        ProviderKind::Mock => Arc::new(
            MockEmbeddingProvider::new(config.vector_size.unwrap_or(DEFAULT_VECTOR_SIZE))
                .with_name(name),
        ),
        #[cfg(feature = "provider-fastembed")]
        ProviderKind::FastEmbed => Arc::new(crate::fastembed::FastEmbedProvider::from_config(config)?),
        #[cfg(not(feature = "provider-fastembed"))]
        ProviderKind::FastEmbed => {
            return Err(Error::config(format!(
                "Provider '{name}' requires the provider-fastembed feature"
            )));
        }
    };
    Ok(provider)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nls_core::ErrorKind;

    fn configs() -> BTreeMap<String, ProviderConfig> {
        let mut configs = BTreeMap::new();
        configs.insert(
            "mock".to_string(),
            ProviderConfig {
                vector_size: Some(4),
                ..ProviderConfig::enabled(ProviderKind::Mock)
            },
        );
        configs.insert(
            "ollama".to_string(),
            ProviderConfig::enabled(ProviderKind::Ollama),
        );
        configs.insert("openai".to_string(), ProviderConfig::default());
        configs
    }

    #[test]
    fn test_from_config_builds_enabled() {
        let registry = ProviderRegistry::from_config(&configs()).unwrap();
        assert_eq!(registry.names(), vec!["mock", "ollama"]);

        let mock = registry.get("mock").unwrap();
        assert_eq!(mock.dimension(), Some(4));
        assert_eq!(mock.name(), "mock");
    }

    #[test]
    fn test_get_unknown_provider() {
        let registry = ProviderRegistry::from_config(&configs()).unwrap();
        let err = registry.get("nope").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("Unknown provider: nope"));
    }

    #[test]
    fn test_get_disabled_provider() {
        let registry = ProviderRegistry::from_config(&configs()).unwrap();
        let err = registry.get("openai").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("Provider openai is not enabled"));
    }

    #[test]
    fn test_from_config_fails_fast_on_bad_entry() {
        let mut configs = BTreeMap::new();
        // Enabled, kind inferred from name, but no api_key
        configs.insert(
            "openai".to_string(),
            ProviderConfig {
                enabled: true,
                ..Default::default()
            },
        );
        let err = ProviderRegistry::from_config(&configs).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_from_config_unknown_kind() {
        let mut configs = BTreeMap::new();
        configs.insert(
            "custom".to_string(),
            ProviderConfig {
                enabled: true,
                ..Default::default()
            },
        );
        let err = ProviderRegistry::from_config(&configs).err().unwrap();
        assert!(err.to_string().contains("Unknown provider: custom"));
    }

    #[test]
    fn test_register_and_disable() {
        let registry = ProviderRegistry::new()
            .with_provider("a", Arc::new(MockEmbeddingProvider::new(2)))
            .with_disabled("b");

        assert!(registry.get("a").is_ok());
        assert!(registry.get("b").is_err());
        assert!(!registry.is_empty());
    }
}
