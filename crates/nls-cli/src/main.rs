//! The `nls` binary.

use anyhow::Context;
use clap::Parser;
use nls_cli::{CliArgs, NlsCli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let cli = NlsCli::from_args(&args).context("failed to load configuration")?;
    cli.run(args).await?;
    Ok(())
}
