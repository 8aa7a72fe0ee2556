//! Command-line interface definitions.

pub mod check;
pub mod dedup;
pub mod gather;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Driftnet - Redundant capture pipeline for prediction-market exchange data.
#[derive(Parser, Debug)]
#[command(name = "driftnet")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a gatherer node (WebSocket ingestion into the local store)
    Gather(GatherArgs),

    /// Run the deduplicator node (merge gatherer stores into the central store)
    Dedup(DedupArgs),

    /// Run offline checks
    #[command(subcommand)]
    Check(CheckCommand),
}

#[derive(Args, Debug)]
pub struct GatherArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Force JSON log output
    #[arg(long)]
    pub json_logs: bool,
}

#[derive(Args, Debug)]
pub struct DedupArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Force JSON log output
    #[arg(long)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Load and validate a configuration file, then print a summary
    Config(CheckConfigArgs),
}

#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}
