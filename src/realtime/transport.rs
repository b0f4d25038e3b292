//! Transport seam for the realtime session.
//!
//! The session drives a [`RealtimeTransport`] capability injected at
//! construction time. [`WsTransport`] is the production implementation over
//! tokio-tungstenite; tests drive the session with a scripted transport
//! instead, so the protocol logic never needs a live endpoint.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{SttError, SttResult};

/// Message-oriented bidirectional connection used by the realtime session.
///
/// `recv` performs a bounded-timeout read: `Ok(None)` means "no event
/// available now" and is not an error. `close` is idempotent.
#[async_trait]
pub trait RealtimeTransport: Send {
    /// Send a text frame.
    async fn send(&mut self, text: String) -> SttResult<()>;

    /// Attempt to receive a text frame, waiting at most `wait`.
    ///
    /// Returns `Ok(None)` when nothing arrived within the window, and
    /// [`SttError::ConnectionClosed`] when the peer has closed.
    async fn recv(&mut self, wait: Duration) -> SttResult<Option<String>>;

    /// Close the connection. Safe to call more than once.
    async fn close(&mut self) -> SttResult<()>;
}

/// WebSocket transport over tokio-tungstenite.
pub struct WsTransport {
    // Taken on close so a second close is a no-op.
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl WsTransport {
    /// Connect to the realtime endpoint, attaching the bearer credential
    /// and realtime beta header during the handshake.
    pub async fn connect(
        url: &str,
        api_key: &str,
        organization: Option<&str>,
    ) -> SttResult<Self> {
        if api_key.is_empty() {
            return Err(SttError::Configuration(
                "API key is required for the realtime transport".to_string(),
            ));
        }

        let uri: http::Uri = url
            .parse()
            .map_err(|e| SttError::ConnectionFailed(format!("Invalid realtime URL: {e}")))?;
        let host = uri
            .host()
            .ok_or_else(|| {
                SttError::ConnectionFailed("Realtime URL has no host".to_string())
            })?
            .to_string();

        let mut request = http::Request::builder()
            .method("GET")
            .uri(url)
            .header("Host", host)
            .header("Upgrade", "websocket")
            .header("Connection", "upgrade")
            .header("Sec-WebSocket-Key", generate_key())
            .header("Sec-WebSocket-Version", "13")
            .header("Authorization", format!("Bearer {api_key}"))
            .header("OpenAI-Beta", "realtime=v1");

        if let Some(org) = organization {
            request = request.header("OpenAI-Organization", org);
        }

        let request = request.body(()).map_err(|e| {
            SttError::ConnectionFailed(format!("Failed to build WebSocket request: {e}"))
        })?;

        let (stream, _response) = connect_async(request).await.map_err(|e| {
            SttError::ConnectionFailed(format!("Failed to connect to realtime endpoint: {e}"))
        })?;

        info!("Connected to realtime transcription WebSocket");
        Ok(Self {
            stream: Some(stream),
        })
    }
}

#[async_trait]
impl RealtimeTransport for WsTransport {
    async fn send(&mut self, text: String) -> SttResult<()> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            SttError::ConnectionClosed("Transport already closed".to_string())
        })?;

        stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SttError::Network(format!("Failed to send WebSocket message: {e}")))
    }

    async fn recv(&mut self, wait: Duration) -> SttResult<Option<String>> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            SttError::ConnectionClosed("Transport already closed".to_string())
        })?;

        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let frame = match timeout(remaining, stream.next()).await {
                Err(_) => return Ok(None),
                Ok(None) => {
                    return Err(SttError::ConnectionClosed(
                        "WebSocket stream ended".to_string(),
                    ));
                }
                Ok(Some(Err(e))) => {
                    return Err(SttError::Network(format!("WebSocket error: {e}")));
                }
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Message::Text(text) => return Ok(Some(text.as_str().to_owned())),
                Message::Close(close_frame) => {
                    info!("WebSocket connection closed: {:?}", close_frame);
                    return Err(SttError::ConnectionClosed(
                        "Server closed the connection".to_string(),
                    ));
                }
                Message::Binary(_) => {
                    // The realtime API does not send binary frames
                    debug!("Ignoring unexpected binary WebSocket frame");
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Handled automatically by tokio-tungstenite
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> SttResult<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                warn!("Error while closing WebSocket: {}", e);
            }
            info!("Realtime WebSocket transport closed");
        }
        Ok(())
    }
}
