//! Gateway (WebSocket) transport for the Discord API.
//!
//! This module owns the socket itself and the outbound frame formats:
//!   - connect to the gateway URL
//!   - send/receive text frames, turning close frames and socket errors into
//!     [`SessionError`]s
//!   - build IDENTIFY and HEARTBEAT payloads
//!
//! The session state machine in [`crate::session`] only sees the
//! [`GatewayTransport`] trait, so it never touches `tokio_tungstenite`
//! directly.

use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::types::*;

/// Name reported as `browser` in the IDENTIFY connection properties.
pub const CLIENT_NAME: &str = "create-discord-guild";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Options for the gateway session.
#[derive(Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub token: String,
    pub intents: Intents,
}

impl GatewayConfig {
    /// The intents this tool needs: member join events only.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            intents: Intents::GUILD_MEMBERS,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Outbound frames
// ---------------------------------------------------------------------------

/// IDENTIFY (op 2) for the given token and intents.
pub fn identify_frame(token: &str, intents: Intents) -> String {
    let frame = GatewayFrame {
        op: OpCode::Identify,
        d: Identify {
            token: token.to_string(),
            intents: intents.bits(),
            properties: ConnectionProperties {
                os: std::env::consts::OS.to_string(),
                browser: CLIENT_NAME.to_string(),
                device: std::env::consts::OS.to_string(),
            },
        },
    };
    serde_json::json!(frame).to_string()
}

/// HEARTBEAT (op 1) with a null sequence.
pub fn heartbeat_frame() -> String {
    serde_json::json!(GatewayFrame {
        op: OpCode::Heartbeat,
        d: None::<u64>,
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Transport boundary
// ---------------------------------------------------------------------------

/// A connected gateway socket.
pub trait GatewayTransport {
    /// Send one text frame.
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Wait for the next inbound text frame.
    ///
    /// A server close, the end of the stream and socket failures are all
    /// errors: the session has no way to recover from them.
    fn next_text(&mut self) -> impl Future<Output = Result<String, SessionError>> + Send;

    /// Close the socket.
    fn close(&mut self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// [`GatewayTransport`] over a real WebSocket.
pub struct WsTransport {
    stream: WsStream,
}

/// Open a WebSocket to the gateway.
pub async fn connect(url: &str) -> Result<WsTransport, SessionError> {
    info!(url = %url, "connecting to Discord gateway");
    let (stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| SessionError::Connect(e.to_string()))?;
    info!("WebSocket connected");
    Ok(WsTransport { stream })
}

impl GatewayTransport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SessionError::Socket(e.to_string()))
    }

    async fn next_text(&mut self) -> Result<String, SessionError> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(SessionError::Socket(e.to_string())),
                None => return Err(SessionError::StreamEnded),
            };

            match msg {
                Message::Text(text) => return Ok(text.as_str().to_owned()),
                Message::Close(frame) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_owned()),
                        None => (None, String::new()),
                    };
                    warn!(close_code = ?code, reason = %reason, "WebSocket closed by server");
                    return Err(SessionError::Closed { code, reason });
                }
                // Ping/Pong are answered by tungstenite; binary frames only
                // appear with compression, which we never request.
                other => debug!(kind = ?other, "ignoring non-text frame"),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| SessionError::Socket(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
