//! The document unit of storage and retrieval.
//!
//! A [`Document`] is built from caller input with its key normalized at
//! construction time, gains an embedding during indexing, and comes back
//! from search carrying a `score`.
//!
//! # Metadata coercion
//!
//! Records exported from document databases use extended-JSON wrappers for
//! types JSON cannot express (`{"$oid": ...}`, `{"$numberDecimal": ...}`).
//! Stores persist plain JSON, so metadata is coerced on the way in:
//!
//! | Input | Stored as |
//! |-------|-----------|
//! | `{"$oid": "507f..."}` | `"507f..."` |
//! | `{"$numberDecimal": "1.25"}` | `1.25` |
//! | `{"$numberLong": "7"}`, `{"$numberInt": "7"}` | `7` |
//! | `{"$numberDouble": "2.5"}` | `2.5` |
//! | `{"$date": "2024-01-01T00:00:00Z"}` | `"2024-01-01T00:00:00Z"` |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::key::DocumentKey;
use crate::{Error, Result};

/// Document metadata: string keys to JSON values.
pub type Metadata = Map<String, Value>;

/// A document with optional embedding and (for search results) a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Normalized key; serialized as `id` on the wire.
    #[serde(rename = "id")]
    pub key: DocumentKey,

    /// Text body used for embedding generation.
    pub content: String,

    /// Arbitrary JSON metadata, already coerced to plain JSON.
    #[serde(default)]
    pub metadata: Metadata,

    /// Embedding vector, once generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Relevance score, present only on search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Document {
    /// Create a document from a raw source identifier and content.
    ///
    /// The identifier is normalized with [`DocumentKey::normalize`].
    ///
    /// # Errors
    ///
    /// Returns a validation error if `content` is empty or whitespace.
    pub fn new(raw_id: &str, content: impl Into<String>) -> Result<Self> {
        Self::with_key(DocumentKey::normalize(raw_id), content)
    }

    /// Create a document from an already-normalized key.
    pub fn with_key(key: DocumentKey, content: impl Into<String>) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(Error::validation(format!(
                "Document {key} has empty content"
            )));
        }
        Ok(Self {
            key,
            content,
            metadata: Metadata::new(),
            embedding: None,
            score: None,
        })
    }

    /// Set the metadata, coercing extended-JSON values.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = coerce_metadata(metadata);
        self
    }

    /// Set the embedding vector.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Set the relevance score.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// The embedding length, if an embedding is present.
    pub fn dimension(&self) -> Option<usize> {
        self.embedding.as_ref().map(Vec::len)
    }
}

// ============================================================================
// Extended-JSON coercion
// ============================================================================

/// Coerce every value in a metadata map.
pub fn coerce_metadata(metadata: Metadata) -> Metadata {
    metadata
        .into_iter()
        .map(|(k, v)| (k, coerce_value(v)))
        .collect()
}

/// Coerce one value, recursing through arrays and objects.
pub fn coerce_value(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(coerce_value).collect()),
        Value::Object(map) => match unwrap_extended(&map) {
            Some(scalar) => scalar,
            None => Value::Object(coerce_metadata(map)),
        },
        other => other,
    }
}

/// Render a record's identifier field as the raw string to normalize.
///
/// Strings are used as-is, `{"$oid": hex}` yields the hex, numbers and
/// booleans their JSON text. `null` yields an empty string.
pub fn raw_identifier(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(map) => match unwrap_extended(map) {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}

/// Unwrap a single-key extended-JSON object into a plain scalar.
fn unwrap_extended(map: &Map<String, Value>) -> Option<Value> {
    if map.len() != 1 {
        return None;
    }
    let (tag, inner) = map.iter().next()?;
    match tag.as_str() {
        "$oid" => inner.as_str().map(|s| Value::String(s.to_string())),
        "$numberDecimal" | "$numberDouble" => numeric_text(inner)
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(Number::from_f64)
            .map(Value::Number),
        "$numberLong" | "$numberInt" => numeric_text(inner)
            .and_then(|s| s.parse::<i64>().ok())
            .map(|n| Value::Number(n.into())),
        "$date" => match inner {
            Value::String(s) => Some(Value::String(s.clone())),
            // Canonical form nests the epoch millis: {"$date": {"$numberLong": "..."}}
            Value::Object(nested) => unwrap_extended(nested),
            Value::Number(n) => Some(Value::Number(n.clone())),
            _ => None,
        },
        _ => None,
    }
}

fn numeric_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
