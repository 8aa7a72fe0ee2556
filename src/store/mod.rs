//! SQLite persistence.
//!
//! The same schema serves both roles: each gatherer owns a local database
//! the writers append to, and the deduplicator owns the central database it
//! merges everything into. Time-series primary keys are the dedup keys.

pub mod connection;
pub mod cursor;
pub mod metadata;
pub mod model;
pub mod schema;
pub mod timeseries;

pub use connection::{create_pool, ping_millis, run_migrations, DbPool};
pub use timeseries::InsertOutcome;

/// Time-series table names, shared by the sync engine and its cursor rows.
pub const TABLE_TRADES: &str = "trades";
pub const TABLE_DELTAS: &str = "orderbook_deltas";
pub const TABLE_SNAPSHOTS: &str = "orderbook_snapshots";
pub const TABLE_TICKERS: &str = "ticker_updates";
