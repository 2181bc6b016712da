//! Command-line interface for NLS Search.
//!
//! The `nls` binary loads [`config::NlsConfig`], wires the provider
//! registry, vector store and record source into an
//! [`nls_server::Services`] root, and either serves the HTTP API or runs a
//! one-shot command against it.

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;

pub use app::{NlsCli, build_services};
pub use cli::CliArgs;
pub use config::NlsConfig;
