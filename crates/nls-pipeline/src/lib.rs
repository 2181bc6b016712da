//! Indexing and search pipelines for NLS Search.
//!
//! Both pipelines are plain structs holding shared handles to a
//! [`ProviderRegistry`](nls_vector::ProviderRegistry) and a
//! [`VectorStore`](nls_vector::VectorStore). Nothing here is global: the
//! service root constructs the handles once and passes them in.
//!
//! # Modules
//!
//! - [`source`]: External record sources and the aggregation subset
//! - [`indexing`]: Single-document and bulk indexing
//! - [`search`]: Query embedding and ranked retrieval

pub mod indexing;
pub mod search;
pub mod source;

// Re-exports: pipelines
pub use indexing::{
    BulkIndexReport, BulkIndexRequest, IndexingPipeline, IndexingSettings, default_batch_size,
};
pub use search::{SearchPipeline, SearchResult, SearchSettings};

// Re-exports: sources
pub use source::{Aggregation, JsonlSource, MemoryRecordSource, Record, RecordSource, RecordStream};
