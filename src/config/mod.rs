//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file; every section has serde defaults
//! so a minimal file only names the endpoints, the signing material, and the
//! node identity. Sensitive values (the RSA private key) are referenced by
//! path, never inlined.

mod api;
mod dedup;
mod logging;
mod manager;
mod poller;
mod registry;
mod router;
mod server;
mod store;
mod writers;

use std::fs;
use std::path::Path;

use serde::Deserialize;

pub use api::ApiConfig;
pub use dedup::{DedupConfig, GathererSource, ProductionConfig, TableCadences, TableSyncParams};
pub use logging::LoggingConfig;
pub use manager::ConnectionManagerConfig;
pub use poller::SnapshotPollerConfig;
pub use registry::RegistryConfig;
pub use router::RouterConfig;
pub use server::ServerConfig;
pub use store::StoreConfig;
pub use writers::{WriterParams, WritersConfig};

use crate::error::{Error, Result};

/// Main application configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Node label; keys metrics and the deduplicator's cursor rows.
    #[serde(default)]
    pub gatherer_id: String,

    /// Exchange endpoints and signing material.
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// WebSocket connection pool settings.
    #[serde(default)]
    pub connection_manager: ConnectionManagerConfig,

    /// Router channel capacities.
    #[serde(default)]
    pub router: RouterConfig,

    /// Batched writer settings.
    #[serde(default)]
    pub writers: WritersConfig,

    /// Periodic REST orderbook snapshot settings.
    #[serde(default)]
    pub snapshot_poller: SnapshotPollerConfig,

    /// Market discovery and reconciliation settings.
    #[serde(default)]
    pub market_registry: RegistryConfig,

    /// Gatherer-local store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Deduplicator node settings.
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Health/metrics HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse_toml(&contents)
    }

    /// Parse and validate configuration from TOML content.
    pub fn parse_toml(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let cm = &self.connection_manager;
        // Six connections carry the doubled global channels.
        if cm.max_connections < 7 {
            return Err(Error::Config(format!(
                "connection_manager.max_connections must be at least 7, got {}",
                cm.max_connections
            )));
        }
        if cm.subscribe_batch_size == 0 {
            return Err(Error::Config(
                "connection_manager.subscribe_batch_size must be positive".into(),
            ));
        }
        if cm.message_buffer_size == 0 || cm.connection_buffer_size == 0 {
            return Err(Error::Config(
                "connection_manager buffer sizes must be positive".into(),
            ));
        }
        if cm.worker_count == 0 {
            return Err(Error::Config(
                "connection_manager.worker_count must be positive".into(),
            ));
        }

        let page_size = self.market_registry.page_size;
        if page_size == 0 || page_size > 1_000 {
            return Err(Error::Config(format!(
                "market_registry.page_size must be in 1..=1000, got {page_size}"
            )));
        }

        if self.writers.defaults.batch_size == 0 {
            return Err(Error::Config("writers.batch_size must be positive".into()));
        }

        if self.snapshot_poller.concurrency == 0 {
            return Err(Error::Config(
                "snapshot_poller.concurrency must be positive".into(),
            ));
        }

        for table in [
            &self.dedup.tables.trades,
            &self.dedup.tables.orderbook_deltas,
            &self.dedup.tables.ticker_updates,
            &self.dedup.tables.orderbook_snapshots,
        ] {
            if table.batch_size <= 0 {
                return Err(Error::Config(
                    "dedup table batch_size must be positive".into(),
                ));
            }
        }

        Ok(())
    }

    /// Validation specific to gatherer nodes.
    pub fn validate_for_gatherer(&self) -> Result<()> {
        if self.gatherer_id.trim().is_empty() {
            return Err(Error::Config("gatherer_id is required".into()));
        }
        if self.api.key_id.trim().is_empty() {
            return Err(Error::Config("api.key_id is required".into()));
        }
        if self.api.private_key_path.as_os_str().is_empty() {
            return Err(Error::Config("api.private_key_path is required".into()));
        }
        Ok(())
    }

    /// Validation specific to the deduplicator node. Signing material is
    /// still required: the metadata sync talks to the REST API.
    pub fn validate_for_dedup(&self) -> Result<()> {
        if self.dedup.gatherers.is_empty() {
            return Err(Error::Config(
                "dedup.gatherers must list at least one gatherer".into(),
            ));
        }
        if self.api.key_id.trim().is_empty() {
            return Err(Error::Config("api.key_id is required".into()));
        }
        if self.api.private_key_path.as_os_str().is_empty() {
            return Err(Error::Config("api.private_key_path is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::parse_toml("").expect("empty config parses");

        assert_eq!(config.connection_manager.max_connections, 150);
        assert_eq!(config.connection_manager.subscribe_batch_size, 500);
        assert_eq!(config.connection_manager.message_buffer_size, 1_000_000);
        assert_eq!(config.connection_manager.worker_count, 10);
        assert_eq!(config.router.orderbook_buffer_size, 5_000);
        assert_eq!(config.router.trade_buffer_size, 1_000);
        assert_eq!(config.writers.defaults.batch_size, 1_000);
        assert_eq!(config.writers.defaults.flush_interval_ms, 1_000);
        assert_eq!(config.snapshot_poller.poll_interval_secs, 900);
        assert_eq!(config.snapshot_poller.concurrency, 100);
        assert_eq!(config.market_registry.reconcile_interval_secs, 300);
        assert_eq!(config.dedup.tables.trades.poll_interval_ms, 100);
        assert_eq!(config.dedup.tables.trades.batch_size, 5_000);
        assert_eq!(config.dedup.tables.orderbook_snapshots.poll_interval_ms, 1_000);
        assert_eq!(config.dedup.api_sync_interval_secs, 300);
    }

    #[test]
    fn rejects_undersized_pool() {
        let toml = r#"
[connection_manager]
max_connections = 3
"#;
        let err = Config::parse_toml(toml).unwrap_err();
        assert!(err.to_string().contains("max_connections"));
    }

    #[test]
    fn rejects_oversized_page() {
        let toml = r#"
[market_registry]
page_size = 5000
"#;
        let err = Config::parse_toml(toml).unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn per_writer_override_applies() {
        let toml = r#"
[writers]
batch_size = 500
flush_interval_ms = 250

[writers.trade]
batch_size = 50
flush_interval_ms = 100
"#;
        let config = Config::parse_toml(toml).expect("config parses");
        assert_eq!(config.writers.trade_params().batch_size, 50);
        assert_eq!(config.writers.orderbook_params().batch_size, 500);
        assert_eq!(config.writers.orderbook_params().flush_interval_ms, 250);
    }

    #[test]
    fn gatherer_validation_requires_identity() {
        let config = Config::parse_toml("").expect("empty config parses");
        assert!(config.validate_for_gatherer().is_err());

        let toml = r#"
gatherer_id = "gatherer-a"

[api]
key_id = "key-1"
private_key_path = "/etc/driftnet/key.pem"
"#;
        let config = Config::parse_toml(toml).expect("config parses");
        assert!(config.validate_for_gatherer().is_ok());
    }

    #[test]
    fn dedup_validation_requires_sources() {
        let config = Config::parse_toml("").expect("empty config parses");
        assert!(config.validate_for_dedup().is_err());

        let toml = r#"
[api]
key_id = "key-1"
private_key_path = "/etc/driftnet/key.pem"

[[dedup.gatherers]]
id = "gatherer-a"
database_path = "/var/lib/driftnet/a.db"
"#;
        let config = Config::parse_toml(toml).expect("config parses");
        assert!(config.validate_for_dedup().is_ok());
    }
}
