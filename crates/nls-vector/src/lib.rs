//! Embedding providers and vector stores for NLS Search.
//!
//! This crate provides the two pluggable capabilities the pipelines are
//! built on: turning text into vectors, and storing/searching those
//! vectors. HTTP providers and the in-memory store are always available;
//! local embeddings and Qdrant are feature-gated.
//!
//! # Features
//!
//! - `store-qdrant`: Enable the Qdrant vector store
//! - `provider-fastembed`: Enable local embedding generation via fastembed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        nls-vector                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider trait                                    │
//! │  ├── MockEmbeddingProvider (always available)               │
//! │  ├── OpenAiProvider / OllamaProvider / GeminiProvider       │
//! │  └── FastEmbedProvider (feature: provider-fastembed)        │
//! │  ProviderRegistry (name → provider, built from config)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorStore trait                                          │
//! │  ├── MemoryVectorStore (always available)                   │
//! │  └── QdrantVectorStore (feature: store-qdrant)              │
//! │  create_vector_store (type → store, bound to a dimension)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// Core modules (always available)
pub mod embedding;
pub mod memory;
pub mod registry;
pub mod store;
pub mod types;

// HTTP providers
mod http;
pub mod gemini;
pub mod ollama;
pub mod openai;

// Feature-gated backend modules
#[cfg(feature = "provider-fastembed")]
pub mod fastembed;

#[cfg(feature = "store-qdrant")]
pub mod qdrant;

// Re-exports: traits
pub use embedding::{EmbeddingProvider, MockEmbeddingProvider};
pub use store::VectorStore;

// Re-exports: implementations
pub use gemini::GeminiProvider;
pub use memory::MemoryVectorStore;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

// Re-exports: config and factories
pub use registry::{ProviderRegistry, create_provider};
pub use store::create_vector_store;
pub use types::{DEFAULT_VECTOR_SIZE, DimensionPolicy, ProviderConfig, ProviderKind, StoreConfig};

// Feature-gated re-exports
#[cfg(feature = "provider-fastembed")]
pub use crate::fastembed::FastEmbedProvider;

#[cfg(feature = "store-qdrant")]
pub use qdrant::QdrantVectorStore;
