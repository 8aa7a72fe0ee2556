//! Batched writer configuration.

use serde::Deserialize;

/// Batch/flush parameters for one writer.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WriterParams {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

fn default_batch_size() -> usize {
    1_000
}

fn default_flush_interval_ms() -> u64 {
    1_000
}

impl Default for WriterParams {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

/// Per-writer overrides on top of shared defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WritersConfig {
    /// Shared defaults applied where no override is given.
    #[serde(flatten)]
    pub defaults: WriterParams,
    #[serde(default)]
    pub trade: Option<WriterParams>,
    #[serde(default)]
    pub orderbook: Option<WriterParams>,
    #[serde(default)]
    pub ticker: Option<WriterParams>,
}

impl WritersConfig {
    pub fn trade_params(&self) -> WriterParams {
        self.trade.unwrap_or(self.defaults)
    }

    pub fn orderbook_params(&self) -> WriterParams {
        self.orderbook.unwrap_or(self.defaults)
    }

    pub fn ticker_params(&self) -> WriterParams {
        self.ticker.unwrap_or(self.defaults)
    }
}
