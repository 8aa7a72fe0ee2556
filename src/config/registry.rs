//! Market registry configuration.

use serde::Deserialize;

/// Market discovery and reconciliation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Seconds between reconciliation sweeps against the REST API.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    /// Page size for paginated market/event listings (max 1000).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Deadline for the initial market sweep (seconds); failure is fatal.
    #[serde(default = "default_initial_load_timeout_secs")]
    pub initial_load_timeout_secs: u64,
    /// Change-stream queue capacity; full queue drops new changes.
    #[serde(default = "default_change_buffer_size")]
    pub change_buffer_size: usize,
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

fn default_page_size() -> u32 {
    1_000
}

fn default_initial_load_timeout_secs() -> u64 {
    300
}

fn default_change_buffer_size() -> usize {
    10_000
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval_secs(),
            page_size: default_page_size(),
            initial_load_timeout_secs: default_initial_load_timeout_secs(),
            change_buffer_size: default_change_buffer_size(),
        }
    }
}
