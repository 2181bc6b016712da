//! Natural-language search.
//!
//! The query is embedded with the selected provider, its length checked
//! against the store dimension, and the store's nearest neighbours returned
//! highest score first. The dimension check runs before the store is
//! touched: a mismatched vector would otherwise produce meaningless scores
//! or a backend rejection.

use nls_core::{Error, Metadata, Result, with_timeout};
use nls_vector::{ProviderRegistry, VectorStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use nls_vector::store::sort_by_score;

/// Tunables for search.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Provider used when the request names none.
    pub default_provider: String,
    /// Result limit when the request gives none.
    pub max_results: usize,
    /// Minimum score a result must reach.
    pub similarity_threshold: f32,
    /// Time budget for the embedding call and for the store query.
    pub timeout: Duration,
}

impl SearchSettings {
    /// Defaults for the given provider name.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            default_provider: default_provider.into(),
            max_results: 10,
            similarity_threshold: 0.0,
            timeout: Duration::from_secs(60),
        }
    }

    /// Sets the default result limit.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Sets the similarity threshold.
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Sets the per-call time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One ranked hit, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Document key.
    pub id: String,
    /// Document text.
    pub content: String,
    /// Document metadata.
    pub metadata: Metadata,
    /// Similarity score; higher is more relevant.
    pub score: f32,
}

/// Runs queries against the store.
#[derive(Clone)]
pub struct SearchPipeline {
    providers: Arc<ProviderRegistry>,
    store: Arc<dyn VectorStore>,
    settings: SearchSettings,
}

impl SearchPipeline {
    /// Create a pipeline over shared provider and store handles.
    pub fn new(
        providers: Arc<ProviderRegistry>,
        store: Arc<dyn VectorStore>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            providers,
            store,
            settings,
        }
    }

    /// The settings in effect.
    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Search for documents similar to `query`.
    ///
    /// `provider` overrides the default provider; `max_results` of `None`
    /// or zero uses the configured default.
    ///
    /// # Errors
    ///
    /// - Validation: empty query, or an embedding whose length differs from
    ///   the store dimension
    /// - Configuration: unknown or disabled provider
    /// - Provider, Store, Timeout: from the underlying calls
    pub async fn search(
        &self,
        query: &str,
        provider: Option<&str>,
        max_results: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::validation("Search query cannot be empty"));
        }

        let provider_name = provider.unwrap_or(&self.settings.default_provider);
        let provider = self.providers.get(provider_name)?;
        log::info!("Searching with provider '{provider_name}'");

        let embedding = with_timeout(self.settings.timeout, "query embedding", provider.embed(query)).await?;
        log::debug!("Generated query embedding of size {}", embedding.len());

        let expected = self.store.dimension();
        if embedding.len() != expected {
            return Err(Error::validation(format!(
                "Vector size mismatch: Provider '{provider_name}' generated embedding of size {}, but vector DB expects {expected}",
                embedding.len()
            )));
        }

        let limit = max_results
            .filter(|n| *n > 0)
            .unwrap_or(self.settings.max_results);
        log::debug!(
            "Performing semantic search with limit={limit} and threshold={}",
            self.settings.similarity_threshold
        );

        let mut docs = with_timeout(
            self.settings.timeout,
            "store search",
            self.store
                .search(&embedding, limit, self.settings.similarity_threshold),
        )
        .await?;
        sort_by_score(&mut docs);
        log::info!("Found {} results", docs.len());

        Ok(docs
            .into_iter()
            .map(|doc| SearchResult {
                id: doc.key.to_string(),
                content: doc.content,
                metadata: doc.metadata,
                score: doc.score.unwrap_or_default(),
            })
            .collect())
    }
}

impl std::fmt::Debug for SearchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchPipeline")
            .field("store", &self.store.name())
            .field("settings", &self.settings)
            .finish()
    }
}
