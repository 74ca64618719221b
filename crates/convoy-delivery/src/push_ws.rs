// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket implementation of the push transport.
//!
//! Wire format, server -> client (JSON):
//! ```json
//! {"event": "message.sent", "data": {"message": {...}, "session": {...}}}
//! ```
//!
//! Client -> server on subscribe (JSON):
//! ```json
//! {"event": "subscribe", "channel": "conversation.<session_id>"}
//! ```

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use convoy_core::ConvoyError;
use convoy_core::traits::{PushChannel, PushEnvelope};
use convoy_core::types::{Message, SessionId, SessionSnapshot};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Push channel over a WebSocket connection to a per-session topic.
pub struct WsPushChannel {
    url: String,
    inner: Mutex<Option<WsStream>>,
}

impl WsPushChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            inner: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PushChannel for WsPushChannel {
    async fn subscribe(&self, session_id: &SessionId) -> Result<(), ConvoyError> {
        let (mut ws, _) = connect_async(self.url.as_str()).await.map_err(|e| ConvoyError::Push {
            message: format!("websocket connect failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let frame = serde_json::json!({
            "event": "subscribe",
            "channel": format!("conversation.{session_id}"),
        });
        ws.send(WsMessage::Text(frame.to_string().into()))
            .await
            .map_err(|e| ConvoyError::Push {
                message: format!("subscribe frame failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        debug!(session_id = %session_id, "push channel subscribed");
        *self.inner.lock().await = Some(ws);
        Ok(())
    }

    async fn receive(&self) -> Result<PushEnvelope, ConvoyError> {
        let mut guard = self.inner.lock().await;
        let ws = guard.as_mut().ok_or_else(|| ConvoyError::Push {
            message: "not subscribed".to_string(),
            source: None,
        })?;

        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Text(text))) => match parse_envelope(&text) {
                    Some(envelope) => return Ok(envelope),
                    None => {
                        debug!("ignoring non-envelope websocket frame");
                        continue;
                    }
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    *guard = None;
                    return Err(ConvoyError::Push {
                        message: "push connection closed".to_string(),
                        source: None,
                    });
                }
                // Ping/pong are handled by the tungstenite layer.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    *guard = None;
                    return Err(ConvoyError::Push {
                        message: format!("push receive failed: {e}"),
                        source: Some(Box::new(e)),
                    });
                }
            }
        }
    }

    async fn shutdown(&self) -> Result<(), ConvoyError> {
        if let Some(mut ws) = self.inner.lock().await.take() {
            if let Err(e) = ws.close(None).await {
                warn!(error = %e, "push channel close error");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Frame {
    event: String,
    data: FrameData,
}

#[derive(Debug, Deserialize)]
struct FrameData {
    message: Message,
    #[serde(default)]
    session: Option<SessionSnapshot>,
}

/// Parses a broadcast frame into a [`PushEnvelope`]; returns `None` for
/// frames that are not message broadcasts (acks, presence, etc.).
fn parse_envelope(text: &str) -> Option<PushEnvelope> {
    let frame: Frame = serde_json::from_str(text).ok()?;
    Some(PushEnvelope {
        event: frame.event,
        message: frame.data.message,
        session: frame.data.session,
    })
}
