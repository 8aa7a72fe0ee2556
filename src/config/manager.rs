//! Connection manager configuration.

use serde::Deserialize;

/// Fixed-pool WebSocket connection manager settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionManagerConfig {
    /// Total connections in the pool. Six carry the global channels
    /// (2x ticker, 2x trade, 2x lifecycle); the remainder carry orderbook
    /// subscriptions.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Tickers per multi-ticker subscribe command during startup.
    #[serde(default = "default_subscribe_batch_size")]
    pub subscribe_batch_size: usize,
    /// Deadline for a subscribe/unsubscribe command response (seconds).
    #[serde(default = "default_subscribe_timeout_secs")]
    pub subscribe_timeout_secs: u64,
    /// Initial reconnect backoff (seconds).
    #[serde(default = "default_reconnect_base_wait_secs")]
    pub reconnect_base_wait_secs: u64,
    /// Reconnect backoff cap (seconds).
    #[serde(default = "default_reconnect_max_wait_secs")]
    pub reconnect_max_wait_secs: u64,
    /// Central raw-frame queue capacity between read loops and the router.
    #[serde(default = "default_message_buffer_size")]
    pub message_buffer_size: usize,
    /// Per-connection inbound frame queue capacity.
    #[serde(default = "default_connection_buffer_size")]
    pub connection_buffer_size: usize,
    /// Subscribe worker pool size.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Subscribe work queue capacity; sized for the worst-case initial sweep.
    #[serde(default = "default_subscribe_queue_size")]
    pub subscribe_queue_size: usize,
    /// Seconds without any inbound activity before a connection is stale.
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
    /// Client keepalive ping interval (seconds).
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
}

fn default_max_connections() -> usize {
    150
}

fn default_subscribe_batch_size() -> usize {
    500
}

fn default_subscribe_timeout_secs() -> u64 {
    10
}

fn default_reconnect_base_wait_secs() -> u64 {
    1
}

fn default_reconnect_max_wait_secs() -> u64 {
    60
}

fn default_message_buffer_size() -> usize {
    1_000_000
}

fn default_connection_buffer_size() -> usize {
    1_000
}

fn default_worker_count() -> usize {
    10
}

fn default_subscribe_queue_size() -> usize {
    200_000
}

fn default_ping_timeout_secs() -> u64 {
    60
}

fn default_keepalive_interval_secs() -> u64 {
    30
}

impl Default for ConnectionManagerConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            subscribe_batch_size: default_subscribe_batch_size(),
            subscribe_timeout_secs: default_subscribe_timeout_secs(),
            reconnect_base_wait_secs: default_reconnect_base_wait_secs(),
            reconnect_max_wait_secs: default_reconnect_max_wait_secs(),
            message_buffer_size: default_message_buffer_size(),
            connection_buffer_size: default_connection_buffer_size(),
            worker_count: default_worker_count(),
            subscribe_queue_size: default_subscribe_queue_size(),
            ping_timeout_secs: default_ping_timeout_secs(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
        }
    }
}
