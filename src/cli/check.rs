//! Handlers for the `check` subcommands.

use super::{CheckCommand, CheckConfigArgs};
use crate::config::Config;
use crate::error::Result;

/// Execute a check subcommand.
pub fn execute(cmd: &CheckCommand) -> Result<()> {
    match cmd {
        CheckCommand::Config(args) => check_config(args),
    }
}

fn check_config(args: &CheckConfigArgs) -> Result<()> {
    let config = Config::load(&args.config)?;

    println!("configuration ok: {}", args.config.display());
    println!("  gatherer_id:        {}", config.gatherer_id);
    println!("  api base_url:       {}", config.api.base_url);
    println!("  api ws_url:         {}", config.api.ws_url);
    println!("  connections:        {}", config.connection_manager.max_connections);
    println!("  local database:     {}", config.store.database_path.display());
    println!("  central database:   {}", config.dedup.production.database_path.display());
    println!("  gatherer sources:   {}", config.dedup.gatherers.len());
    println!("  health bind:        {}", config.server.bind_addr);

    Ok(())
}
