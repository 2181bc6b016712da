//! The `nls` application: logging setup, service wiring, command dispatch.

use crate::cli::{CliArgs, Command};
use crate::config::NlsConfig;
use crate::config_handlers;
use nls_core::{Error, Metadata, Result};
use nls_pipeline::{BulkIndexRequest, JsonlSource, RecordSource, SearchResult};
use nls_server::Services;
use nls_vector::{ProviderRegistry, create_vector_store};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Service wiring
// ============================================================================

/// Build the service root from configuration.
///
/// Every enabled provider is constructed up front and the default provider
/// must be among them, so misconfiguration fails here rather than on the
/// first request.
pub async fn build_services(config: &NlsConfig) -> Result<Services> {
    config.validate()?;
    let providers = ProviderRegistry::from_config(&config.providers)?;
    providers.get(&config.search.default_provider)?;

    let dimension = config.vector_size();
    let store = create_vector_store(&config.vector_db, dimension).await?;
    let source = build_source(config)?;

    Ok(Services::new(
        Arc::new(providers),
        store,
        source,
        config.indexing_settings(),
        config.search_settings(),
    ))
}

fn build_source(config: &NlsConfig) -> Result<Arc<dyn RecordSource>> {
    match config.source.source_type.as_str() {
        "jsonl" => {
            let root = config.source.path.as_deref().unwrap_or(".");
            Ok(Arc::new(JsonlSource::new(root)))
        }
        other => Err(Error::config(format!("Unsupported source type: {other}"))),
    }
}

// ============================================================================
// NlsCli
// ============================================================================

/// The CLI application.
pub struct NlsCli {
    name: String,
    config: NlsConfig,
    version: String,
}

impl NlsCli {
    /// Create from CLI args, loading config from file/env.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let config = NlsConfig::load(args.config.as_deref())?;
        Ok(Self::new(config))
    }

    /// Create an application over an already loaded config.
    pub fn new(config: NlsConfig) -> Self {
        Self {
            name: "nls".to_string(),
            config,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &NlsConfig {
        &self.config
    }

    /// Initialise tracing-based logging.
    ///
    /// Uses `RUST_LOG` env var if set, otherwise defaults based on verbosity flags.
    pub fn init_logging(verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // A subscriber may already be installed (e.g. in tests).
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    /// Run the CLI with the given arguments.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        Self::init_logging(args.verbose, args.quiet);

        match args.command {
            Some(Command::Version) => {
                println!("{} {}", self.name, self.version);
                Ok(())
            }
            Some(Command::Config(config_cmd)) => {
                config_handlers::handle_config_command(args.config.as_deref(), config_cmd.command)
            }
            Some(Command::Serve { host, port }) => self.serve(host, port).await,
            Some(Command::Health) => {
                let services = build_services(&self.config).await?;
                let report = services.health().await;
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            }
            Some(Command::Search {
                query,
                provider,
                limit,
                json,
            }) => {
                let services = build_services(&self.config).await?;
                let results = services.search(&query, provider.as_deref(), limit).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&results)?);
                } else {
                    print_results(&results);
                }
                Ok(())
            }
            Some(Command::Index {
                id,
                content,
                metadata,
            }) => {
                let metadata = metadata.as_deref().map(parse_metadata).transpose()?;
                let services = build_services(&self.config).await?;
                let key = services.index(&id, content, metadata).await?;
                println!("Indexed {id} as {key}");
                Ok(())
            }
            Some(Command::Delete { id }) => {
                let services = build_services(&self.config).await?;
                let key = services.delete(&id).await?;
                println!("Deleted {id} ({key})");
                Ok(())
            }
            Some(Command::BulkIndex {
                collection,
                pipeline,
                id_field,
                content_field,
                metadata_fields,
                batch_size,
            }) => {
                let mut request = BulkIndexRequest::new(collection);
                request.batch_size = batch_size;
                request.id_field = id_field;
                request.content_field = content_field;
                if let Some(pipeline) = pipeline {
                    request = request.with_pipeline(parse_pipeline(&pipeline)?);
                }
                if let Some(fields) = metadata_fields {
                    request = request.with_metadata_fields(fields);
                }

                let services = build_services(&self.config).await?;
                let report = services.bulk_index(&request).await?;
                println!(
                    "Indexed {} documents ({} errors) in {:.2}s, {:.2} docs/s",
                    report.indexed_count, report.error_count, report.elapsed_time, report.rate
                );
                if let Some(fatal) = report.fatal_error {
                    return Err(Error::source_error(format!("Bulk run stopped early: {fatal}")));
                }
                Ok(())
            }
            None => {
                println!("{} {}, use --help for usage", self.name, self.version);
                Ok(())
            }
        }
    }

    async fn serve(&self, host: Option<String>, port: Option<u16>) -> Result<()> {
        let host = host.unwrap_or_else(|| self.config.server.host.clone());
        let port = port.unwrap_or(self.config.server.port);
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| Error::config(format!("Invalid listen address {host}:{port}: {e}")))?;

        let services = build_services(&self.config).await?;
        tracing::info!(
            store = services.store().name(),
            dimension = services.store().dimension(),
            "Starting {} {}",
            self.name,
            self.version
        );
        nls_server::serve(addr, services).await?;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_metadata(raw: &str) -> Result<Metadata> {
    serde_json::from_str(raw).map_err(|e| Error::validation(format!("Invalid metadata JSON: {e}")))
}

fn parse_pipeline(raw: &str) -> Result<Vec<Value>> {
    serde_json::from_str(raw)
        .map_err(|e| Error::validation(format!("Aggregation pipeline must be a JSON array: {e}")))
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results");
        return;
    }
    for (rank, result) in results.iter().enumerate() {
        println!("{:>2}. [{:.3}] {}", rank + 1, result.score, result.id);
        println!("    {}", result.content);
    }
}

// ============================================================================
// Tests
// ============================================================================
