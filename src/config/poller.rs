//! Snapshot poller configuration.

use serde::Deserialize;

/// Periodic REST orderbook snapshot settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotPollerConfig {
    /// Seconds between full sweeps of the active-market set.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Maximum in-flight orderbook fetches.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-fetch timeout (seconds).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    900
}

fn default_concurrency() -> usize {
    100
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for SnapshotPollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
