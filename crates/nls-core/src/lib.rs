//! NLS Core: shared types, errors, and utilities.
//!
//! This crate provides the foundational types used across all NLS crates.
//! It has no internal NLS dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error taxonomy and Result alias
//! - [`key`]: Deterministic document key normalization
//! - [`document`]: The `Document` unit of storage and metadata coercion
//! - [`retry`]: Bounded retry with exponential backoff

pub mod document;
pub mod error;
pub mod key;
pub mod retry;

// Re-export key types at crate root for convenience
pub use document::{Document, Metadata, coerce_metadata, coerce_value, raw_identifier};
pub use error::{Error, ErrorKind, Result};
pub use key::{DocumentKey, normalize};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy, with_timeout};
