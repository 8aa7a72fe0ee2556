//! Health/metrics HTTP server configuration.

use serde::Deserialize;

/// Bind settings for the observability endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address for `/health` and `/metrics`.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Disable the server entirely (tests, one-shot runs).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_bind_addr() -> String {
    "127.0.0.1:9464".into()
}

fn default_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            enabled: default_enabled(),
        }
    }
}
