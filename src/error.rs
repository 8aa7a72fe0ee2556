use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Exchange API error: status {status}, body: {body}")]
    Api { status: u16, body: String },

    #[error("Subscribe command rejected: code {code}, {message}")]
    Subscribe { code: u32, message: String },

    #[error("Command timed out after {0:?}")]
    CommandTimeout(std::time::Duration),

    #[error("Connection {0} is not available")]
    ConnectionUnavailable(u64),

    #[error("No healthy orderbook connection available")]
    NoCapacity,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Startup failed: {0}")]
    Startup(String),
}

impl Error {
    /// True for transport-level failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::WebSocket(_) | Self::Io(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
