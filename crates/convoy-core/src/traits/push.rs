// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push transport seam for server-initiated message delivery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConvoyError;
use crate::types::{Message, SessionId, SessionSnapshot};

/// One event delivered over the push transport.
///
/// Two event names are accepted for the same payload shape, for
/// compatibility with differing broadcast-naming conventions; the payload is
/// always `{message, session?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEnvelope {
    /// Broadcast event name as sent by the server.
    pub event: String,
    pub message: Message,
    #[serde(default)]
    pub session: Option<SessionSnapshot>,
}

/// A subscription-based transport delivering events as they occur.
///
/// Push is the primary inbound path (low latency, no polling cost), but it
/// may not be ready at startup and may silently drop messages during
/// reconnection; the poll fallback remains the correctness backstop.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Subscribe to the per-session topic.
    ///
    /// May fail if the transport is not ready yet; callers retry with
    /// bounded attempts and then give up silently.
    async fn subscribe(&self, session_id: &SessionId) -> Result<(), ConvoyError>;

    /// Next event from the subscribed topic. Blocks until one is available.
    async fn receive(&self) -> Result<PushEnvelope, ConvoyError>;

    /// Tear down the subscription and release the transport.
    async fn shutdown(&self) -> Result<(), ConvoyError>;
}
