//! WebSocket dial with signed handshake.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::auth::RequestSigner;
use crate::error::{Error, Result};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials the exchange WebSocket with the signed handshake headers.
#[derive(Clone)]
pub struct SignedDialer {
    ws_url: String,
    /// Path component of the WS URL; part of the signed payload.
    ws_path: String,
    signer: Arc<RequestSigner>,
}

impl SignedDialer {
    pub fn new(ws_url: impl Into<String>, signer: Arc<RequestSigner>) -> Result<Self> {
        let ws_url = ws_url.into();
        let parsed = url::Url::parse(&ws_url)?;
        let ws_path = parsed.path().to_string();

        Ok(Self {
            ws_url,
            ws_path,
            signer,
        })
    }

    /// Open one authenticated connection.
    ///
    /// The handshake signs `GET` + the WS endpoint path with the same scheme
    /// as REST requests.
    pub async fn dial(&self) -> Result<WsStream> {
        let signed = self.signer.sign("GET", &self.ws_path);

        let mut request = self.ws_url.clone().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(RequestSigner::KEY_HEADER, header_value(&signed.key)?);
        headers.insert(
            RequestSigner::TIMESTAMP_HEADER,
            header_value(&signed.timestamp_ms.to_string())?,
        );
        headers.insert(
            RequestSigner::SIGNATURE_HEADER,
            header_value(&signed.signature)?,
        );

        let (stream, response) = connect_async(request).await?;
        debug!(status = %response.status(), "WebSocket connected");

        Ok(stream)
    }
}

fn header_value(s: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(s).map_err(|e| Error::Signing(format!("invalid header value: {e}")))
}
