//! CLI argument parsing and command definitions.

use clap::{Parser, Subcommand};

// ============================================================================
// CLI argument types
// ============================================================================

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "nls", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "NLS_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server.
    Serve {
        /// Host address to bind to (overrides `server.host`).
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides `server.port`).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Search the index.
    Search {
        /// Natural-language query.
        query: String,

        /// Provider to embed the query with.
        #[arg(short, long)]
        provider: Option<String>,

        /// Maximum number of results.
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Index one document.
    Index {
        /// Raw document identifier.
        id: String,

        /// Text to embed.
        content: String,

        /// Metadata as a JSON object.
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Ingest a collection from the configured record source.
    BulkIndex {
        /// Source collection name.
        collection: String,

        /// Aggregation pipeline as a JSON array.
        #[arg(long)]
        pipeline: Option<String>,

        /// Field holding the record identifier.
        #[arg(long, default_value = "_id")]
        id_field: String,

        /// Field holding the text to embed.
        #[arg(long, default_value = "content")]
        content_field: String,

        /// Fields copied into metadata (comma-separated).
        #[arg(long, value_delimiter = ',')]
        metadata_fields: Option<Vec<String>>,

        /// Documents per store write (defaults to `indexing.batch_size`).
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Delete one document.
    Delete {
        /// Raw document identifier.
        id: String,
    },

    /// Print version information.
    Version,

    /// Check store health.
    Health,

    /// Configuration operations.
    Config(ConfigCommand),
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Get a configuration value by dotted key.
    Get {
        /// Dotted key (e.g., "search.default_provider").
        key: String,
    },

    /// Set a configuration value by dotted key.
    Set {
        /// Dotted key (e.g., "server.port").
        key: String,

        /// Value to set.
        value: String,
    },

    /// Create a default configuration file.
    Init {
        /// Output file path (defaults to XDG config path).
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite existing file.
        #[arg(long)]
        force: bool,
    },

    /// Export configuration as environment variables.
    Export {
        /// Format as Docker --env flags.
        #[arg(long)]
        docker_env: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_default() {
        let args = CliArgs::parse_from(["nls"]);
        assert!(!args.verbose);
        assert!(!args.quiet);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_cli_args_flags() {
        let args = CliArgs::parse_from(["nls", "-v", "--config", "/path/to/config.toml"]);
        assert!(args.verbose);
        assert_eq!(args.config.as_deref(), Some("/path/to/config.toml"));
    }

    #[test]
    fn test_serve_command_overrides() {
        let args = CliArgs::parse_from(["nls", "serve", "--port", "8080"]);
        assert!(matches!(
            args.command,
            Some(Command::Serve { host: None, port: Some(8080) })
        ));
    }

    #[test]
    fn test_search_command() {
        let args = CliArgs::parse_from(["nls", "search", "cozy loft", "-n", "3", "--provider", "ollama"]);
        let Some(Command::Search { query, provider, limit, json }) = args.command else {
            unreachable!("expected search command");
        };
        assert_eq!(query, "cozy loft");
        assert_eq!(provider.as_deref(), Some("ollama"));
        assert_eq!(limit, Some(3));
        assert!(!json);
    }

    #[test]
    fn test_bulk_index_command_defaults() {
        let args = CliArgs::parse_from(["nls", "bulk-index", "listings"]);
        let Some(Command::BulkIndex {
            collection,
            pipeline,
            id_field,
            content_field,
            metadata_fields,
            batch_size,
        }) = args.command
        else {
            unreachable!("expected bulk-index command");
        };
        assert_eq!(collection, "listings");
        assert!(pipeline.is_none());
        assert_eq!(id_field, "_id");
        assert_eq!(content_field, "content");
        assert!(metadata_fields.is_none());
        assert!(batch_size.is_none());
    }

    #[test]
    fn test_bulk_index_metadata_fields_split() {
        let args = CliArgs::parse_from([
            "nls",
            "bulk-index",
            "listings",
            "--metadata-fields",
            "name,price",
        ]);
        let Some(Command::BulkIndex { metadata_fields, .. }) = args.command else {
            unreachable!("expected bulk-index command");
        };
        assert_eq!(metadata_fields, Some(vec!["name".to_string(), "price".to_string()]));
    }

    #[test]
    fn test_config_init_command() {
        let args = CliArgs::parse_from(["nls", "config", "init", "--force"]);
        let Some(Command::Config(cmd)) = args.command else {
            unreachable!("expected config command");
        };
        assert!(matches!(cmd.command, ConfigAction::Init { file: None, force: true }));
    }
}
