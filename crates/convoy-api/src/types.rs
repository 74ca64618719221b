// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the Session API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use convoy_core::types::{
    ContentType, HandoffPriority, HandoffRequestStatus, HandoffTrigger, Message, SenderType,
    SessionId, SessionSnapshot,
};

/// Body of `POST /conversations/start`.
#[derive(Debug, Clone, Serialize)]
pub struct StartConversationRequest {
    pub tenant_id: u64,
    pub widget_config_id: u64,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_url: Option<String>,
}

/// Response of `POST /conversations/start`.
#[derive(Debug, Clone, Deserialize)]
pub struct StartConversationResponse {
    pub session: SessionSnapshot,
}

/// Body of `POST /conversations/messages/send`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub session_id: SessionId,
    pub content: String,
    pub sender_type: SenderType,
    pub content_type: ContentType,
}

/// Response of `POST /conversations/messages/send`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    pub message: Message,
}

/// Body of `POST /conversations/handoff/request`.
#[derive(Debug, Clone, Serialize)]
pub struct RequestHandoffBody {
    pub session_id: SessionId,
    pub trigger_type: HandoffTrigger,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub priority: HandoffPriority,
}

/// The acknowledgment inside a handoff response: only id and status are
/// guaranteed by the contract.
#[derive(Debug, Clone, Deserialize)]
pub struct HandoffAck {
    pub id: i64,
    pub status: HandoffRequestStatus,
}

/// Response of `POST /conversations/handoff/request`.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestHandoffResponse {
    pub handoff_request: HandoffAck,
}

/// Response of `GET /conversations/{session_id}/messages`.
///
/// Carries the current session snapshot alongside the messages newer than
/// the `since` cursor; the snapshot feeds
/// `SessionManager::observe_status`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationUpdate {
    pub conversation: SessionSnapshot,
    pub messages: Vec<Message>,
}

/// Body of `POST /widget/events` (best-effort analytics).
#[derive(Debug, Clone, Serialize)]
pub struct WidgetEventBody {
    pub event_type: String,
    pub session_id: Option<SessionId>,
    pub event_data: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}
