//! Single-document and bulk indexing.
//!
//! # Bulk runs
//!
//! A bulk run streams records from a [`RecordSource`] one at a time, turns
//! each into an embedded [`Document`], and persists them in batches of
//! `batch_size`. Failures fall into two classes, decided by error kind:
//!
//! - **Recoverable** (per record): missing content, embedding failure after
//!   retries, dimension mismatch. The record is dropped, the error counted
//!   and logged, and the run continues.
//! - **Fatal** (per run): the source stream fails, or a batch flush still
//!   fails after retries. The run stops and the report carries the counters
//!   accumulated so far.
//!
//! Batches that were flushed before a fatal error stay indexed.

use futures::StreamExt;
use nls_core::{
    Document, DocumentKey, Error, ErrorKind, Metadata, Result, RetryPolicy, coerce_value,
    raw_identifier, with_timeout,
};
use nls_vector::{EmbeddingProvider, ProviderRegistry, VectorStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::source::{Aggregation, Record, RecordSource, lookup};

/// Number of recoverable errors echoed in the completion log.
const LOGGED_ERRORS: usize = 5;

/// Tunables for indexing.
#[derive(Debug, Clone)]
pub struct IndexingSettings {
    /// Provider used for every embedding.
    pub default_provider: String,
    /// Retry policy for embedding calls and batch flushes.
    pub retry: RetryPolicy,
    /// Time budget for one embedding call.
    pub embed_timeout: Duration,
    /// Time budget for one store write (single document or whole batch).
    pub store_timeout: Duration,
    /// Maximum recoverable error messages kept in a report.
    pub error_log_limit: usize,
    /// Documents per store write when a bulk request names none.
    pub batch_size: usize,
}

impl IndexingSettings {
    /// Defaults for the given provider name.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            default_provider: default_provider.into(),
            retry: RetryPolicy::default(),
            embed_timeout: Duration::from_secs(120),
            store_timeout: Duration::from_secs(60),
            error_log_limit: 1000,
            batch_size: default_batch_size(),
        }
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the embedding and store time budgets.
    pub fn with_timeouts(mut self, embed: Duration, store: Duration) -> Self {
        self.embed_timeout = embed;
        self.store_timeout = store;
        self
    }

    /// Sets how many recoverable error messages a report keeps.
    pub fn with_error_log_limit(mut self, limit: usize) -> Self {
        self.error_log_limit = limit;
        self
    }

    /// Sets the default bulk batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

// ============================================================================
// Bulk request / report
// ============================================================================

/// Parameters of one bulk run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkIndexRequest {
    /// Source collection name.
    pub collection_name: String,
    /// Aggregation pipeline applied by the source.
    #[serde(default)]
    pub aggregation_pipeline: Vec<Value>,
    /// Field holding the record identifier.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Field holding the text to embed.
    #[serde(default = "default_content_field")]
    pub content_field: String,
    /// Fields copied into metadata; absent fields are omitted.
    #[serde(default)]
    pub metadata_fields: Option<Vec<String>>,
    /// Documents per store write; the pipeline's configured size when absent.
    #[serde(default)]
    pub batch_size: Option<usize>,
}

fn default_id_field() -> String {
    "_id".to_string()
}

fn default_content_field() -> String {
    "content".to_string()
}

/// Default documents per store write.
pub fn default_batch_size() -> usize {
    1000
}

impl BulkIndexRequest {
    /// A request for `collection` with default fields.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection_name: collection.into(),
            aggregation_pipeline: Vec::new(),
            id_field: default_id_field(),
            content_field: default_content_field(),
            metadata_fields: None,
            batch_size: None,
        }
    }

    /// Sets the aggregation pipeline.
    pub fn with_pipeline(mut self, pipeline: Vec<Value>) -> Self {
        self.aggregation_pipeline = pipeline;
        self
    }

    /// Sets the metadata fields.
    pub fn with_metadata_fields(mut self, fields: Vec<String>) -> Self {
        self.metadata_fields = Some(fields);
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// Outcome of a bulk run, complete or cut short.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkIndexReport {
    /// Documents durably written.
    pub indexed_count: usize,
    /// Records dropped with a recoverable error.
    pub error_count: usize,
    /// Wall time in seconds.
    pub elapsed_time: f64,
    /// `indexed_count / elapsed_time`.
    pub rate: f64,
    /// Error messages, recoverable first; a fatal error comes last.
    pub errors: Vec<String>,
    /// Store writes that succeeded.
    pub batches_flushed: usize,
    /// The error that stopped the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
}

impl BulkIndexReport {
    /// Whether the run consumed the whole source.
    pub fn completed(&self) -> bool {
        self.fatal_error.is_none()
    }
}

/// Running counters of a bulk run.
struct RunState {
    started: Instant,
    total: Option<u64>,
    error_log_limit: usize,
    report: BulkIndexReport,
}

impl RunState {
    fn new(total: Option<u64>, error_log_limit: usize) -> Self {
        Self {
            started: Instant::now(),
            total,
            error_log_limit,
            report: BulkIndexReport::default(),
        }
    }

    fn record_error(&mut self, message: String) {
        log::warn!("{message}");
        self.report.error_count += 1;
        if self.report.errors.len() < self.error_log_limit {
            self.report.errors.push(message);
        }
    }

    fn record_flush(&mut self, count: usize) {
        self.report.indexed_count += count;
        self.report.batches_flushed += 1;

        let rate = self.rate();
        match self.total {
            Some(total) if total > 0 => {
                let pct = self.report.indexed_count as f64 / total as f64 * 100.0;
                log::info!(
                    "Progress: {}/{total} ({pct:.1}%) - Rate: {rate:.1} docs/sec - Errors: {}",
                    self.report.indexed_count,
                    self.report.error_count
                );
            }
            _ => log::info!(
                "Progress: {} indexed - Rate: {rate:.1} docs/sec - Errors: {}",
                self.report.indexed_count,
                self.report.error_count
            ),
        }
    }

    fn rate(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.report.indexed_count as f64 / elapsed
        } else {
            0.0
        }
    }

    fn finish(mut self, fatal: Option<Error>) -> BulkIndexReport {
        if let Some(err) = fatal {
            let message = format!("Error in bulk indexing: {err}");
            log::error!("{message}");
            self.report.errors.push(message.clone());
            self.report.fatal_error = Some(message);
        }
        self.report.elapsed_time = self.started.elapsed().as_secs_f64();
        self.report.rate = self.rate();

        log::info!(
            "Bulk indexing {} in {:.1} seconds: {} indexed, {:.1} docs/sec, {} errors",
            if self.report.completed() { "completed" } else { "stopped" },
            self.report.elapsed_time,
            self.report.indexed_count,
            self.report.rate,
            self.report.error_count
        );
        if !self.report.errors.is_empty() {
            let first: Vec<&String> = self.report.errors.iter().take(LOGGED_ERRORS).collect();
            log::warn!("First few errors encountered: {first:?}");
        }
        self.report
    }
}

/// Per-record failures that end the run rather than skip the record.
fn is_fatal(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Source | ErrorKind::Io)
}

// ============================================================================
// Pipeline
// ============================================================================

/// Embeds documents and writes them to the store.
#[derive(Clone)]
pub struct IndexingPipeline {
    providers: Arc<ProviderRegistry>,
    store: Arc<dyn VectorStore>,
    settings: IndexingSettings,
}

impl IndexingPipeline {
    /// Create a pipeline over shared provider and store handles.
    pub fn new(
        providers: Arc<ProviderRegistry>,
        store: Arc<dyn VectorStore>,
        settings: IndexingSettings,
    ) -> Self {
        Self {
            providers,
            store,
            settings,
        }
    }

    /// The settings in effect.
    pub fn settings(&self) -> &IndexingSettings {
        &self.settings
    }

    fn provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        self.providers.get(&self.settings.default_provider)
    }

    /// Generate an embedding with retries and a per-call time budget, and
    /// check it against the store dimension.
    async fn embed(&self, provider: &Arc<dyn EmbeddingProvider>, text: &str) -> Result<Vec<f32>> {
        let budget = self.settings.embed_timeout;
        let embedding = self
            .settings
            .retry
            .run("embedding generation", || {
                with_timeout(budget, "embedding generation", provider.embed(text))
            })
            .await?;

        let expected = self.store.dimension();
        if embedding.len() != expected {
            return Err(Error::validation(format!(
                "Vector size mismatch: Provider '{}' generated embedding of size {}, but vector DB expects {expected}",
                provider.name(),
                embedding.len()
            )));
        }
        Ok(embedding)
    }

    async fn ensure_embedding(&self, doc: Document) -> Result<Document> {
        if doc.embedding.is_some() {
            return Ok(doc);
        }
        let provider = self.provider()?;
        let embedding = self.embed(&provider, &doc.content).await?;
        log::debug!("Generated embedding of size {} for {}", embedding.len(), doc.key);
        Ok(doc.with_embedding(embedding))
    }

    /// Index one document, embedding it first if needed.
    ///
    /// Errors propagate unmodified; nothing is written on failure.
    pub async fn index(&self, doc: Document) -> Result<DocumentKey> {
        log::info!(
            "Indexing document {} using provider '{}'",
            doc.key,
            self.settings.default_provider
        );
        let doc = self.ensure_embedding(doc).await?;
        with_timeout(self.settings.store_timeout, "store write", self.store.add(&doc)).await?;
        log::debug!("Successfully indexed document {}", doc.key);
        Ok(doc.key)
    }

    /// Re-embed and upsert an existing document.
    pub async fn update(&self, doc: Document) -> Result<DocumentKey> {
        log::info!("Updating document {}", doc.key);
        let doc = self.ensure_embedding(doc).await?;
        with_timeout(
            self.settings.store_timeout,
            "store write",
            self.store.update(&doc),
        )
        .await?;
        Ok(doc.key)
    }

    /// Delete by key. Absent keys succeed.
    pub async fn delete(&self, key: &DocumentKey) -> Result<()> {
        log::info!("Deleting document {key}");
        with_timeout(
            self.settings.store_timeout,
            "store delete",
            self.store.delete(key),
        )
        .await
    }

    /// Stream a collection from `source` into the store.
    ///
    /// # Errors
    ///
    /// Only request problems found before any record is read are returned as
    /// `Err`: zero batch size, an invalid pipeline, or an unusable default
    /// provider. Everything after that is reported in the
    /// [`BulkIndexReport`].
    pub async fn bulk_index(
        &self,
        source: &dyn RecordSource,
        request: &BulkIndexRequest,
    ) -> Result<BulkIndexReport> {
        let batch_size = request.batch_size.unwrap_or(self.settings.batch_size);
        if batch_size == 0 {
            return Err(Error::validation("batch_size must be greater than zero"));
        }
        let aggregation = Aggregation::parse(&request.aggregation_pipeline)?;
        let provider = self.provider()?;

        log::info!(
            "Starting bulk indexing from collection '{}' via {} source",
            request.collection_name,
            source.name()
        );
        log::info!(
            "Configuration: id_field='{}', content_field='{}', metadata_fields={:?}, batch_size={}",
            request.id_field,
            request.content_field,
            request.metadata_fields,
            batch_size
        );

        let total = match source.count(&request.collection_name).await {
            Ok(total) => total,
            Err(e) => {
                log::warn!("Could not count '{}': {e}", request.collection_name);
                None
            }
        };
        if let Some(total) = total {
            log::info!("Found {total} documents to process");
        }

        let mut state = RunState::new(total, self.settings.error_log_limit);
        let fatal = self
            .run(source, request, batch_size, aggregation, &provider, &mut state)
            .await
            .err();
        Ok(state.finish(fatal))
    }

    async fn run(
        &self,
        source: &dyn RecordSource,
        request: &BulkIndexRequest,
        batch_size: usize,
        aggregation: Aggregation,
        provider: &Arc<dyn EmbeddingProvider>,
        state: &mut RunState,
    ) -> Result<()> {
        let mut records = source
            .aggregate(&request.collection_name, aggregation)
            .await?;
        let mut batch: Vec<Document> = Vec::with_capacity(batch_size);
        let mut position = 0usize;

        while let Some(item) = records.next().await {
            let record = item?;
            position += 1;

            match self.prepare(provider, request, &record, position).await {
                Ok(doc) => batch.push(doc),
                Err(e) if is_fatal(e.kind()) => return Err(e),
                Err(e) => {
                    state.record_error(e.to_string());
                    continue;
                }
            }

            if batch.len() >= batch_size {
                self.flush(&mut batch, state).await?;
            }
        }

        if !batch.is_empty() {
            log::info!("Processing final batch of {} documents", batch.len());
            self.flush(&mut batch, state).await?;
        }
        Ok(())
    }

    /// Turn one raw record into an embedded document.
    async fn prepare(
        &self,
        provider: &Arc<dyn EmbeddingProvider>,
        request: &BulkIndexRequest,
        record: &Record,
        position: usize,
    ) -> Result<Document> {
        let raw_id = lookup(record, &request.id_field)
            .map(raw_identifier)
            .unwrap_or_default();
        let label = format!("record #{position} (id '{raw_id}')");

        let content = match lookup(record, &request.content_field) {
            None | Some(Value::Null) => {
                return Err(Error::validation(format!(
                    "Missing content field '{}' for {label}",
                    request.content_field
                )));
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(Error::validation(format!(
                    "Empty content field '{}' for {label}",
                    request.content_field
                )));
            }
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(Error::validation(format!(
                    "Content field '{}' is not text for {label}",
                    request.content_field
                )));
            }
        };

        let metadata: Metadata = request
            .metadata_fields
            .iter()
            .flatten()
            .filter_map(|field| {
                lookup(record, field).map(|v| (field.clone(), coerce_value(v.clone())))
            })
            .collect();

        let doc = Document::new(&raw_id, content)
            .map_err(|e| Error::validation(format!("Error creating document for {label}: {e}")))?
            .with_metadata(metadata);

        let embedding = self
            .embed(provider, &doc.content)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::Validation => Error::validation(format!("{label}: {e}")),
                _ => Error::provider(format!("Error processing {label}: {e}")),
            })?;
        log::debug!("Generated embedding of size {} for {label}", embedding.len());
        Ok(doc.with_embedding(embedding))
    }

    /// Persist and clear the batch, retrying the whole write.
    async fn flush(&self, batch: &mut Vec<Document>, state: &mut RunState) -> Result<()> {
        log::info!("Processing batch of {} documents", batch.len());
        let budget = self.settings.store_timeout;
        let docs: &[Document] = batch.as_slice();
        self.settings
            .retry
            .run("batch write", || {
                with_timeout(budget, "batch write", self.store.add_batch(docs))
            })
            .await?;
        state.record_flush(batch.len());
        batch.clear();
        Ok(())
    }
}

impl std::fmt::Debug for IndexingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingPipeline")
            .field("store", &self.store.name())
            .field("settings", &self.settings)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
