//! Handler for the `dedup` command.

use tracing::info;

use super::DedupArgs;
use crate::app;
use crate::config::Config;
use crate::error::Result;

/// Execute the dedup command.
pub async fn execute(args: &DedupArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".into();
    }
    config.logging.init();

    info!(config = %args.config.display(), "Starting deduplicator");

    app::deduplicator::run(config).await
}
