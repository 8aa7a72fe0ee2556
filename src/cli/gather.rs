//! Handler for the `gather` command.

use tracing::info;

use super::GatherArgs;
use crate::app;
use crate::config::Config;
use crate::error::Result;

/// Execute the gather command.
pub async fn execute(args: &GatherArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".into();
    }
    config.logging.init();

    info!(
        gatherer_id = %config.gatherer_id,
        config = %args.config.display(),
        "Starting gatherer"
    );

    app::gatherer::run(config).await
}
