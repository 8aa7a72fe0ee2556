//! Message router configuration.

use serde::Deserialize;

/// Capacities of the typed channels between the router and the writers.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_orderbook_buffer_size")]
    pub orderbook_buffer_size: usize,
    #[serde(default = "default_trade_buffer_size")]
    pub trade_buffer_size: usize,
    #[serde(default = "default_ticker_buffer_size")]
    pub ticker_buffer_size: usize,
    /// Snapshot channel also feeds from the REST poller.
    #[serde(default = "default_snapshot_buffer_size")]
    pub snapshot_buffer_size: usize,
}

fn default_orderbook_buffer_size() -> usize {
    5_000
}

fn default_trade_buffer_size() -> usize {
    1_000
}

fn default_ticker_buffer_size() -> usize {
    1_000
}

fn default_snapshot_buffer_size() -> usize {
    1_000
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            orderbook_buffer_size: default_orderbook_buffer_size(),
            trade_buffer_size: default_trade_buffer_size(),
            ticker_buffer_size: default_ticker_buffer_size(),
            snapshot_buffer_size: default_snapshot_buffer_size(),
        }
    }
}
