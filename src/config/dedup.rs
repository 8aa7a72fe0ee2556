//! Deduplicator configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// One gatherer whose local store the deduplicator reads.
#[derive(Debug, Clone, Deserialize)]
pub struct GathererSource {
    /// Gatherer label; keys the sync-cursor rows.
    pub id: String,
    /// Path to that gatherer's local database file.
    pub database_path: PathBuf,
}

/// Central (production) store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductionConfig {
    #[serde(default = "default_production_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_production_path() -> PathBuf {
    PathBuf::from("driftnet-central.db")
}

fn default_pool_size() -> u32 {
    8
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            database_path: default_production_path(),
            pool_size: default_pool_size(),
        }
    }
}

/// Sync cadence for one time-series table.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TableSyncParams {
    /// Milliseconds between sync ticks.
    pub poll_interval_ms: u64,
    /// Rows per cursor batch.
    pub batch_size: i64,
    /// Whether gatherers for this table drain in parallel.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_parallel() -> bool {
    true
}

/// Per-table sync cadences.
#[derive(Debug, Clone, Deserialize)]
pub struct TableCadences {
    #[serde(default = "default_fast_table")]
    pub trades: TableSyncParams,
    #[serde(default = "default_fast_table")]
    pub orderbook_deltas: TableSyncParams,
    #[serde(default = "default_fast_table")]
    pub ticker_updates: TableSyncParams,
    #[serde(default = "default_snapshot_table")]
    pub orderbook_snapshots: TableSyncParams,
}

fn default_fast_table() -> TableSyncParams {
    TableSyncParams {
        poll_interval_ms: 100,
        batch_size: 5_000,
        parallel: true,
    }
}

fn default_snapshot_table() -> TableSyncParams {
    TableSyncParams {
        poll_interval_ms: 1_000,
        batch_size: 1_000,
        parallel: true,
    }
}

impl Default for TableCadences {
    fn default() -> Self {
        Self {
            trades: default_fast_table(),
            orderbook_deltas: default_fast_table(),
            ticker_updates: default_fast_table(),
            orderbook_snapshots: default_snapshot_table(),
        }
    }
}

/// Deduplicator node settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// Gatherer stores to merge.
    #[serde(default)]
    pub gatherers: Vec<GathererSource>,
    /// Central store connection info.
    #[serde(default)]
    pub production: ProductionConfig,
    /// Per-table sync cadences.
    #[serde(default)]
    pub tables: TableCadences,
    /// Seconds between REST metadata refreshes.
    #[serde(default = "default_api_sync_interval_secs")]
    pub api_sync_interval_secs: u64,
}

fn default_api_sync_interval_secs() -> u64 {
    300
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            gatherers: Vec::new(),
            production: ProductionConfig::default(),
            tables: TableCadences::default(),
            api_sync_interval_secs: default_api_sync_interval_secs(),
        }
    }
}
