//! Configuration for the `nls` binary.
//!
//! Provides the [`NlsConfig`] struct that loads from TOML files,
//! environment variables, and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `NLS_CONFIG` environment variable
//! 3. XDG default: `~/.config/nls/config.toml`
//! 4. Built-in defaults
//!
//! After loading, every string of the exact form `${VAR}` is replaced by the
//! value of `VAR`. Unset variables leave the literal in place.

use confyg::{Confygery, env};
use nls_core::{DEFAULT_MAX_ATTEMPTS, Error, Result, RetryPolicy};
use nls_pipeline::{IndexingSettings, SearchSettings, default_batch_size};
use nls_vector::{DEFAULT_VECTOR_SIZE, ProviderConfig, ProviderKind, StoreConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "NLS_CONFIG";

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration for the `nls` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NlsConfig {
    /// HTTP listener.
    pub server: ServerConfig,

    /// Search defaults.
    pub search: SearchConfig,

    /// Embedding provider registry, keyed by name.
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Vector store.
    pub vector_db: StoreConfig,

    /// Record source for bulk ingestion.
    pub source: SourceConfig,

    /// Retry and batching for indexing.
    pub indexing: IndexingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,
}

/// Search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Provider used when a request names none; also sizes the store.
    pub default_provider: String,

    /// Result limit when a request gives none.
    pub max_results: usize,

    /// Minimum score a result must reach.
    pub similarity_threshold: f32,

    /// Time budget in seconds for the query embedding and for the store query.
    pub timeout_secs: u64,
}

/// Bulk-ingestion record source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source type; only `jsonl` is bundled.
    #[serde(rename = "type")]
    pub source_type: String,

    /// Directory holding `<collection>.jsonl` files.
    pub path: Option<String>,
}

/// Indexing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Attempts per embedding call and per batch flush, at most 3.
    pub max_attempts: u32,

    /// First retry delay in milliseconds.
    pub base_delay_ms: u64,

    /// Retry delay ceiling in milliseconds.
    pub max_delay_ms: u64,

    /// Default documents per store write for bulk runs.
    pub batch_size: usize,

    /// Maximum recoverable error messages kept in a bulk report.
    pub error_log_limit: usize,

    /// Time budget in seconds for one embedding call.
    pub embed_timeout_secs: u64,

    /// Time budget in seconds for one store write.
    pub store_timeout_secs: u64,
}

// ============================================================================
// Default implementations
// ============================================================================

impl Default for NlsConfig {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderConfig {
                api_key: Some("${OPENAI_API_KEY}".to_string()),
                vector_size: Some(DEFAULT_VECTOR_SIZE),
                ..ProviderConfig::enabled(ProviderKind::OpenAi)
            },
        );
        providers.insert(
            "ollama".to_string(),
            ProviderConfig {
                enabled: false,
                vector_size: Some(768),
                ..ProviderConfig::enabled(ProviderKind::Ollama)
            },
        );

        Self {
            server: ServerConfig::default(),
            search: SearchConfig::default(),
            providers,
            vector_db: StoreConfig::default(),
            source: SourceConfig::default(),
            indexing: IndexingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            max_results: 10,
            similarity_threshold: 0.0,
            timeout_secs: 60,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            source_type: "jsonl".to_string(),
            path: None,
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            batch_size: default_batch_size(),
            error_log_limit: 1000,
            embed_timeout_secs: 120,
            store_timeout_secs: 60,
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl NlsConfig {
    /// Load configuration from file, environment, and defaults.
    ///
    /// Loading priority:
    /// 1. Explicit `config_path` (from `--config` flag)
    /// 2. `NLS_CONFIG` env var
    /// 3. XDG default: `~/.config/nls/config.toml`
    /// 4. Built-in defaults
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path)
            && path.exists()
        {
            builder
                .add_file(&path.to_string_lossy())
                .map_err(|e| Error::config(format!("config file: {e}")))?;
        }

        let mut env_opts = env::Options::with_top_level("NLS");
        env_opts.add_section("server");
        env_opts.add_section("search");
        env_opts.add_section("vector_db");
        env_opts.add_section("source");
        env_opts.add_section("indexing");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;

        let config = config.interpolate_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings outside their allowed range.
    pub fn validate(&self) -> Result<()> {
        let attempts = self.indexing.max_attempts;
        if !(1..=DEFAULT_MAX_ATTEMPTS).contains(&attempts) {
            return Err(Error::config(format!(
                "indexing.max_attempts must be between 1 and {DEFAULT_MAX_ATTEMPTS}, got {attempts}"
            )));
        }
        Ok(())
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        Self::resolve_config_path_with(explicit, |name| std::env::var(name).ok())
    }

    /// [`resolve_config_path`](Self::resolve_config_path) with an injected
    /// environment lookup.
    pub fn resolve_config_path_with(
        explicit: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }

        if let Some(path) = lookup(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("nls").join("config.toml"))
    }

    /// Replace `${VAR}` strings anywhere in the config using `lookup`.
    pub fn interpolate_env(self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut value = serde_json::to_value(&self)?;
        interpolate_value(&mut value, &lookup);
        Ok(serde_json::from_value(value)?)
    }

    /// Store dimension: `vector_db.vector_size`, else the default provider's
    /// `vector_size`, else 1536.
    pub fn vector_size(&self) -> usize {
        self.vector_db
            .vector_size
            .or_else(|| {
                self.providers
                    .get(&self.search.default_provider)
                    .and_then(|p| p.vector_size)
            })
            .unwrap_or(DEFAULT_VECTOR_SIZE)
    }

    /// Retry policy for embedding calls and batch flushes.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.indexing.max_attempts)
            .with_base_delay(Duration::from_millis(self.indexing.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.indexing.max_delay_ms))
    }

    /// Settings for the indexing pipeline.
    pub fn indexing_settings(&self) -> IndexingSettings {
        IndexingSettings::new(&self.search.default_provider)
            .with_retry(self.retry_policy())
            .with_timeouts(
                Duration::from_secs(self.indexing.embed_timeout_secs),
                Duration::from_secs(self.indexing.store_timeout_secs),
            )
            .with_error_log_limit(self.indexing.error_log_limit)
            .with_batch_size(self.indexing.batch_size)
    }

    /// Settings for the search pipeline.
    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings::new(&self.search.default_provider)
            .with_max_results(self.search.max_results)
            .with_similarity_threshold(self.search.similarity_threshold)
            .with_timeout(Duration::from_secs(self.search.timeout_secs))
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Flatten this config into environment variable pairs with `NLS_` prefix.
    pub fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let value: toml::Value =
            toml::Value::try_from(self).map_err(|e| Error::config(e.to_string()))?;
        let mut vars = Vec::new();
        flatten_toml_value(&value, "NLS", &mut vars);
        Ok(vars)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn interpolate_value(value: &mut Value, lookup: &impl Fn(&str) -> Option<String>) {
    match value {
        Value::String(s) => {
            if let Some(name) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}'))
                && let Some(resolved) = lookup(name)
            {
                *s = resolved;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| interpolate_value(v, lookup)),
        Value::Object(map) => map.values_mut().for_each(|v| interpolate_value(v, lookup)),
        _ => {}
    }
}

/// Recursively flatten a TOML value into `KEY=value` pairs.
fn flatten_toml_value(value: &toml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let env_key = format!("{}_{}", prefix, key.to_uppercase());
                flatten_toml_value(val, &env_key, out);
            }
        }
        toml::Value::Array(arr) => {
            if let Ok(json) = serde_json::to_string(arr) {
                out.push((prefix.to_string(), json));
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        toml::Value::Integer(i) => out.push((prefix.to_string(), i.to_string())),
        toml::Value::Float(f) => out.push((prefix.to_string(), f.to_string())),
        toml::Value::Boolean(b) => out.push((prefix.to_string(), b.to_string())),
        toml::Value::Datetime(dt) => out.push((prefix.to_string(), dt.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nls_core::ErrorKind;
    use nls_vector::DimensionPolicy;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ------------------------------------------------------------------------
    // Default tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_nls_config_default() {
        let config = NlsConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.search.default_provider, "openai");
        assert_eq!(config.search.max_results, 10);
        assert_eq!(config.vector_db.store_type, "memory");
        assert_eq!(config.vector_db.collection_name, "documents");
        assert_eq!(config.indexing.max_attempts, 3);
        assert_eq!(config.indexing.batch_size, 1000);
        assert!(config.providers["openai"].enabled);
        assert!(!config.providers["ollama"].enabled);
    }

    // ------------------------------------------------------------------------
    // Serialization tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_nls_config_from_toml() {
        let toml_str = r#"
            [search]
            default_provider = "ollama"
            max_results = 5
            similarity_threshold = 0.25

            [providers.ollama]
            enabled = true
            embedding_model = "mxbai-embed-large"
            url = "http://ollama:11434"
            vector_size = 1024

            [providers.gemini]
            enabled = false
            api_key = "${GEMINI_API_KEY}"

            [vector_db]
            type = "qdrant"
            url = "http://qdrant:6334"
            collection_name = "listings"
            on_dimension_mismatch = "recreate"

            [source]
            path = "/data/export"
        "#;

        let config: NlsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.search.default_provider, "ollama");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.providers.len(), 2);
        let ollama = &config.providers["ollama"];
        assert_eq!(ollama.model.as_deref(), Some("mxbai-embed-large"));
        assert_eq!(ollama.resolve_kind("ollama"), Some(ProviderKind::Ollama));
        assert_eq!(config.vector_db.store_type, "qdrant");
        assert_eq!(config.vector_db.on_dimension_mismatch, DimensionPolicy::Recreate);
        assert_eq!(config.source.source_type, "jsonl");
        assert_eq!(config.source.path.as_deref(), Some("/data/export"));
        assert_eq!(config.vector_size(), 1024);
    }

    #[test]
    fn test_example_config_parses() {
        let config: NlsConfig = toml::from_str(include_str!("../config.example.toml")).unwrap();
        assert_eq!(config.vector_db.store_type, "qdrant");
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.vector_size(), 1536);
    }

    #[test]
    fn test_nls_config_to_toml() {
        let config = NlsConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("port = 8000"));
        assert!(toml_str.contains("[providers.openai]"));

        let parsed: NlsConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    // ------------------------------------------------------------------------
    // Loading tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_nls_config_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                [server]
                port = 9090

                [search]
                default_provider = "local"

                [providers.local]
                enabled = true
                kind = "mock"
                vector_size = 32
            "#,
        )
        .unwrap();

        let config = NlsConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.search.default_provider, "local");
        assert_eq!(config.vector_size(), 32);
    }

    #[test]
    fn test_nls_config_load_rejects_excess_attempts() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[indexing]\nmax_attempts = 5\n").unwrap();

        let err = NlsConfig::load(Some(path.to_str().unwrap())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("indexing.max_attempts"));
    }

    #[test]
    fn test_validate_attempt_bounds() {
        let mut config = NlsConfig::default();
        assert!(config.validate().is_ok());
        config.indexing.max_attempts = 0;
        assert!(config.validate().is_err());
        config.indexing.max_attempts = 3;
        assert!(config.validate().is_ok());
        config.indexing.max_attempts = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nls_config_load_defaults() {
        let config = NlsConfig::load(Some("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.search.default_provider, "openai");
    }

    // ------------------------------------------------------------------------
    // resolve_config_path tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_resolve_config_path_explicit() {
        let path = NlsConfig::resolve_config_path_with(Some("/explicit/config.toml"), |_| {
            Some("/env/config.toml".to_string())
        });
        assert_eq!(path, Some(PathBuf::from("/explicit/config.toml")));
    }

    #[test]
    fn test_resolve_config_path_env() {
        let path = NlsConfig::resolve_config_path_with(None, |name| {
            (name == CONFIG_ENV).then(|| "/env/config.toml".to_string())
        });
        assert_eq!(path, Some(PathBuf::from("/env/config.toml")));
    }

    #[test]
    fn test_resolve_config_path_default() {
        let path = NlsConfig::resolve_config_path_with(None, no_env).unwrap();
        let p = path.to_str().unwrap();
        assert!(p.contains("nls"));
        assert!(p.ends_with("config.toml"));
    }

    // ------------------------------------------------------------------------
    // Interpolation tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_interpolate_env_replaces_set_variables() {
        let env: HashMap<&str, &str> = [("OPENAI_API_KEY", "sk-test")].into_iter().collect();
        let config = NlsConfig::default()
            .interpolate_env(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.providers["openai"].api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_interpolate_env_keeps_unset_literal() {
        let config = NlsConfig::default().interpolate_env(no_env).unwrap();
        assert_eq!(
            config.providers["openai"].api_key.as_deref(),
            Some("${OPENAI_API_KEY}")
        );
    }

    #[test]
    fn test_interpolate_env_only_whole_values() {
        let mut config = NlsConfig::default();
        config.vector_db.url = Some("http://${HOST}:6334".to_string());
        let config = config
            .interpolate_env(|_| Some("qdrant".to_string()))
            .unwrap();
        assert_eq!(config.vector_db.url.as_deref(), Some("http://${HOST}:6334"));
    }

    // ------------------------------------------------------------------------
    // Derived settings
    // ------------------------------------------------------------------------

    #[test]
    fn test_vector_size_resolution() {
        let mut config = NlsConfig::default();
        assert_eq!(config.vector_size(), 1536);

        config.search.default_provider = "ollama".into();
        assert_eq!(config.vector_size(), 768);

        config.vector_db.vector_size = Some(384);
        assert_eq!(config.vector_size(), 384);

        config.vector_db.vector_size = None;
        config.search.default_provider = "unlisted".into();
        assert_eq!(config.vector_size(), DEFAULT_VECTOR_SIZE);
    }

    #[test]
    fn test_pipeline_settings() {
        let mut config = NlsConfig::default();
        config.indexing.max_attempts = 2;
        config.indexing.base_delay_ms = 10;
        config.indexing.batch_size = 250;
        config.search.max_results = 3;

        let indexing = config.indexing_settings();
        assert_eq!(indexing.default_provider, "openai");
        assert_eq!(indexing.retry.max_attempts(), 2);
        assert_eq!(indexing.batch_size, 250);
        assert_eq!(indexing.retry.base_delay(), Duration::from_millis(10));

        let search = config.search_settings();
        assert_eq!(search.max_results, 3);
        assert_eq!(search.timeout, Duration::from_secs(60));
    }

    // ------------------------------------------------------------------------
    // to_env_vars tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_nls_config_to_env_vars() {
        let vars = NlsConfig::default().to_env_vars().unwrap();
        let map: HashMap<_, _> = vars.into_iter().collect();
        assert_eq!(map.get("NLS_SERVER_PORT").unwrap(), "8000");
        assert_eq!(map.get("NLS_SEARCH_DEFAULT_PROVIDER").unwrap(), "openai");
        assert_eq!(map.get("NLS_VECTOR_DB_TYPE").unwrap(), "memory");
    }

    #[test]
    fn test_nls_config_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NlsConfig>();
    }
}
