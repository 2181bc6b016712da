//! Error types for NLS operations.
//!
//! This module provides the common `Error` type and `Result<T>` alias used
//! across all NLS crates. Uses `thiserror` for derive macros.
//!
//! Callers that need to branch on the failure category (the bulk indexer
//! deciding continue-vs-abort, the retry utility deciding retry-vs-give-up)
//! inspect [`Error::kind`] instead of matching on message text.

use thiserror::Error;

/// Errors that can occur in NLS operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad input shape or value: empty query, dimension mismatch,
    /// missing embedding.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown or disabled provider, unsupported store type, bad settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding generation failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Vector store unavailable or rejected the operation.
    #[error("Store error: {0}")]
    Store(String),

    /// The external record source failed (connection lost, unreadable data).
    #[error("Source error: {0}")]
    Source(String),

    /// A provider or store call exceeded its time budget.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// The category of an [`Error`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Validation`].
    Validation,
    /// See [`Error::Config`].
    Configuration,
    /// See [`Error::Provider`].
    Provider,
    /// See [`Error::Store`].
    Store,
    /// See [`Error::Source`].
    Source,
    /// See [`Error::Timeout`].
    Timeout,
    /// See [`Error::Io`].
    Io,
    /// See [`Error::Serialization`].
    Serialization,
}

impl Error {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a source error.
    pub fn source_error(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Config(_) => ErrorKind::Configuration,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Store(_) => ErrorKind::Store,
            Self::Source(_) => ErrorKind::Source,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Io(_) => ErrorKind::Io,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Validation and configuration failures are deterministic and never
    /// retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Provider | ErrorKind::Store | ErrorKind::Timeout
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using NLS's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::validation("Search query cannot be empty");
        assert_eq!(
            err.to_string(),
            "Validation error: Search query cannot be empty"
        );

        let err = Error::config("Unknown provider: nope");
        assert_eq!(err.to_string(), "Configuration error: Unknown provider: nope");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(Error::config("x").kind(), ErrorKind::Configuration);
        assert_eq!(Error::provider("x").kind(), ErrorKind::Provider);
        assert_eq!(Error::store("x").kind(), ErrorKind::Store);
        assert_eq!(Error::source_error("x").kind(), ErrorKind::Source);
        assert_eq!(Error::timeout("x").kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(Error::provider("upstream 503").is_retryable());
        assert!(Error::store("connection refused").is_retryable());
        assert!(Error::timeout("embed").is_retryable());

        assert!(!Error::validation("bad").is_retryable());
        assert!(!Error::config("bad").is_retryable());
        assert!(!Error::source_error("gone").is_retryable());
    }

    #[test]
    fn test_from_serde_json() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[test]
    fn test_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!err.is_retryable());
    }
}
