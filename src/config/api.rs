//! Exchange endpoint and signing configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Exchange REST and WebSocket endpoints plus signing material.
///
/// The private key is referenced by path and loaded once at startup; the key
/// itself never appears in config files or logs.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// REST base URL including the API version prefix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// WebSocket endpoint URL.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Access key id issued by the exchange.
    #[serde(default)]
    pub key_id: String,
    /// Path to the PKCS#8 PEM RSA private key.
    #[serde(default)]
    pub private_key_path: PathBuf,
    /// Maximum retry attempts for transient REST failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.exchange.example/trade-api/v2".into()
}

fn default_ws_url() -> String {
    "wss://api.exchange.example/trade-api/ws/v2".into()
}

fn default_max_retries() -> u32 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: default_ws_url(),
            key_id: String::new(),
            private_key_path: PathBuf::new(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
