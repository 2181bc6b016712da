//! Qdrant vector store.
//!
//! Points are keyed by the document key (a UUID) and carry the payload
//! `{content, metadata}`. The collection uses cosine distance.
//!
//! # Readiness
//!
//! [`QdrantVectorStore::connect`] makes sure the collection exists with the
//! configured vector size before returning. A pre-existing collection with
//! a different size is handled per [`DimensionPolicy`]: fail with a
//! configuration error, or drop and recreate it.
//!
//! # Feature Gate
//!
//! This module requires the `store-qdrant` feature.

use async_trait::async_trait;
use nls_core::{Document, DocumentKey, Error, Metadata, Result};
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    GetPointsBuilder, PointId, PointStruct, PointsIdsList, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder, point_id::PointIdOptions,
    value::Kind, vectors_config,
};
use qdrant_client::{Payload, QdrantError};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use uuid::Uuid;

use crate::store::{VectorStore, check_document, check_query, sort_by_score};
use crate::types::{DimensionPolicy, StoreConfig};

const DEFAULT_URL: &str = "http://localhost:6334";

/// Action needed before a collection can serve the configured dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Ready,
    Create,
    Recreate,
}

/// Decide how to prepare `collection`.
///
/// `existing` is `None` when the collection is absent, `Some(None)` when it
/// uses named vectors, and `Some(Some(size))` for a single unnamed vector.
fn reconcile(
    collection: &str,
    existing: Option<Option<usize>>,
    dimension: usize,
    policy: DimensionPolicy,
) -> Result<Readiness> {
    let Some(size) = existing else {
        return Ok(Readiness::Create);
    };
    if size == Some(dimension) {
        return Ok(Readiness::Ready);
    }

    let found = size.map_or_else(|| "named vectors".to_string(), |s| s.to_string());
    match policy {
        DimensionPolicy::Fail => Err(Error::config(format!(
            "Collection '{collection}' has vector size {found}, expected {dimension}"
        ))),
        DimensionPolicy::Recreate => {
            log::warn!(
                "Vector size mismatch ({found} != {dimension}), recreating collection '{collection}'"
            );
            Ok(Readiness::Recreate)
        }
    }
}

/// A `VectorStore` backed by a Qdrant collection.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantVectorStore {
    /// Connect and prepare the collection.
    ///
    /// # Errors
    ///
    /// Store errors if the server is unreachable; a configuration error if
    /// the collection has a different vector size under
    /// [`DimensionPolicy::Fail`].
    pub async fn connect(config: &StoreConfig, dimension: usize) -> Result<Self> {
        let url = config.url.as_deref().unwrap_or(DEFAULT_URL);
        let client = Qdrant::from_url(url)
            .timeout(config.timeout())
            .api_key(config.api_key.clone())
            .build()
            .map_err(|e| Error::config(format!("Invalid Qdrant configuration: {e}")))?;

        let store = Self {
            client,
            collection: config.collection_name.clone(),
            dimension,
        };
        store.ensure_collection(config.on_dimension_mismatch).await?;
        log::info!(
            "Connected to Qdrant at {url}, collection '{}' ({dimension} dims)",
            store.collection
        );
        Ok(store)
    }

    async fn ensure_collection(&self, policy: DimensionPolicy) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(store_error("check collection"))?;
        let existing = if exists {
            Some(self.existing_vector_size().await?)
        } else {
            None
        };

        match reconcile(&self.collection, existing, self.dimension, policy)? {
            Readiness::Ready => {
                log::debug!("Found existing collection '{}'", self.collection);
                Ok(())
            }
            Readiness::Create => {
                log::info!("Creating new collection '{}'", self.collection);
                self.create_collection().await
            }
            Readiness::Recreate => {
                self.client
                    .delete_collection(&self.collection)
                    .await
                    .map_err(store_error("delete collection"))?;
                self.create_collection().await
            }
        }
    }

    async fn existing_vector_size(&self) -> Result<Option<usize>> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(store_error("read collection info"))?;

        let size = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|config| match config {
                vectors_config::Config::Params(params) => Some(params.size as usize),
                vectors_config::Config::ParamsMap(_) => None,
            });
        Ok(size)
    }

    async fn create_collection(&self) -> Result<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(store_error("create collection"))?;
        log::info!(
            "Created collection '{}' with vector size {}",
            self.collection,
            self.dimension
        );
        Ok(())
    }

    fn point(&self, doc: &Document) -> Result<PointStruct> {
        let embedding = check_document(doc, self.dimension)?;
        let payload = Payload::try_from(json!({
            "content": doc.content,
            "metadata": doc.metadata,
        }))
        .map_err(|e| Error::validation(format!("Invalid payload for {}: {e}", doc.key)))?;
        Ok(PointStruct::new(
            doc.key.to_string(),
            embedding.to_vec(),
            payload,
        ))
    }

    async fn upsert(&self, points: Vec<PointStruct>) -> Result<()> {
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(store_error("add documents"))?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "qdrant"
    }

    async fn add(&self, doc: &Document) -> Result<()> {
        let point = self.point(doc)?;
        self.upsert(vec![point]).await
    }

    async fn add_batch(&self, docs: &[Document]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let points = docs
            .iter()
            .map(|doc| self.point(doc))
            .collect::<Result<Vec<_>>>()?;
        self.upsert(points).await
    }

    async fn delete(&self, key: &DocumentKey) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList {
                        ids: vec![PointId::from(key.to_string())],
                    })
                    .wait(true),
            )
            .await
            .map_err(store_error("delete document"))?;
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<Document>> {
        check_query(vector, self.dimension)?;

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector.to_vec(), limit as u64)
                    .score_threshold(score_threshold)
                    .with_payload(true),
            )
            .await
            .map_err(store_error("search"))?;

        let mut docs = response
            .result
            .into_iter()
            .filter_map(|point| {
                let key = point_key(point.id.as_ref())?;
                Some(document_from_payload(key, point.payload).with_score(point.score))
            })
            .collect::<Vec<_>>();
        sort_by_score(&mut docs);
        Ok(docs)
    }

    async fn get(&self, key: &DocumentKey) -> Result<Option<Document>> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, vec![PointId::from(key.to_string())])
                    .with_payload(true),
            )
            .await
            .map_err(store_error("get document"))?;

        Ok(response
            .result
            .into_iter()
            .next()
            .map(|point| document_from_payload(*key, point.payload)))
    }

    async fn count(&self) -> Result<Option<usize>> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(store_error("count documents"))?;
        Ok(response.result.map(|r| r.count as usize))
    }
}

impl std::fmt::Debug for QdrantVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantVectorStore")
            .field("collection", &self.collection)
            .field("dimension", &self.dimension)
            .finish()
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn store_error(op: &'static str) -> impl Fn(QdrantError) -> Error {
    move |e| Error::store(format!("Qdrant failed to {op}: {e}"))
}

fn point_key(id: Option<&PointId>) -> Option<DocumentKey> {
    match id?.point_id_options.as_ref()? {
        PointIdOptions::Uuid(s) => Uuid::parse_str(s).ok().map(DocumentKey::from_uuid),
        PointIdOptions::Num(n) => Some(DocumentKey::normalize(&n.to_string())),
    }
}

fn document_from_payload(key: DocumentKey, mut payload: HashMap<String, QdrantValue>) -> Document {
    let content = payload
        .remove("content")
        .and_then(|v| match v.kind {
            Some(Kind::StringValue(text)) => Some(text),
            _ => None,
        })
        .unwrap_or_default();
    let metadata = match payload.remove("metadata").map(to_json) {
        Some(Value::Object(map)) => map,
        _ => Metadata::new(),
    };
    Document {
        key,
        content,
        metadata,
        embedding: None,
        score: None,
    }
}

fn to_json(value: QdrantValue) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d).map_or(Value::Null, Value::Number),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(list.values.into_iter().map(to_json).collect()),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
    }
}
