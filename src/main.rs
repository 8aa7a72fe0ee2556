use anyhow::Context;
use clap::Parser;
use driftnet::cli::{Cli, Commands};
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Gather(args) => driftnet::cli::gather::execute(&args)
            .await
            .context("gatherer exited with an error"),
        Commands::Dedup(args) => driftnet::cli::dedup::execute(&args)
            .await
            .context("deduplicator exited with an error"),
        Commands::Check(cmd) => driftnet::cli::check::execute(&cmd).context("check failed"),
    };

    if let Err(e) = &result {
        error!(error = %e, "Fatal error");
    }
    result
}
