//! Local store configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Gatherer-local SQLite store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the local time-series database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("driftnet.db")
}

fn default_pool_size() -> u32 {
    8
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            pool_size: default_pool_size(),
        }
    }
}
