// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Convoy workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a conversation session, opaque and stable across reloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned message identifier, unique within a session.
///
/// This is the deduplication key: a message id already forwarded to the UI
/// boundary must never be forwarded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

/// Who is currently serving the conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    /// The automated agent answers; normal operating state.
    BotOnly,
    /// A transfer to a human operator has been requested.
    HandoffRequested,
    /// An operator has been engaged on the conversation.
    HandoffActive,
    /// An operator is actively responding.
    OperatorActive,
    /// The session is closed; terminal.
    Resolved,
}

impl HandoffStatus {
    /// True while a handoff is outstanding or an operator is engaged.
    ///
    /// The supplementary polling channel runs exactly while this holds.
    pub fn is_handoff_engaged(self) -> bool {
        matches!(
            self,
            HandoffStatus::HandoffRequested
                | HandoffStatus::HandoffActive
                | HandoffStatus::OperatorActive
        )
    }

    /// True once the session has reached its terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, HandoffStatus::Resolved)
    }

    /// Whether `from -> to` is a defined edge of the handoff state machine.
    ///
    /// Self-loops are allowed (observing the current status again is a no-op).
    /// A transition into `BotOnly` from any handoff state is "released back
    /// to automation" (operator release or server-side handoff timeout).
    pub fn transition_allowed(from: HandoffStatus, to: HandoffStatus) -> bool {
        use HandoffStatus::*;
        if from == to {
            return true;
        }
        match (from, to) {
            (BotOnly, HandoffRequested) => true,
            (HandoffRequested, HandoffActive | OperatorActive | BotOnly | Resolved) => true,
            (HandoffActive, OperatorActive | BotOnly | Resolved) => true,
            (OperatorActive, HandoffActive | BotOnly | Resolved) => true,
            (Resolved, _) => false,
            _ => false,
        }
    }
}

impl Default for HandoffStatus {
    fn default() -> Self {
        HandoffStatus::BotOnly
    }
}

/// The author of a conversation turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    User,
    Bot,
    Operator,
    System,
}

/// Content encoding of a message body.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Text,
    Markdown,
    Html,
}

/// One conversation turn. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    pub sender_type: SenderType,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub content: String,
    #[serde(default)]
    pub content_type: ContentType,
    pub sent_at: DateTime<Utc>,
}

/// One widget conversation as known to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: SessionId,
    pub tenant_id: u64,
    pub widget_config_id: u64,
    pub handoff_status: HandoffStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// The slice of a session snapshot that inbound delivery consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub handoff_status: HandoffStatus,
}

/// What caused a handoff to be requested.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HandoffTrigger {
    UserRequest,
    BotEscalation,
    Keyword,
}

/// Routing priority of a handoff request.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HandoffPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Server-side lifecycle of a handoff request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HandoffRequestStatus {
    Pending,
    Assigned,
    Resolved,
    Timeout,
}

/// A request to transfer a session to a human operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffRequest {
    pub id: i64,
    pub session_id: SessionId,
    pub trigger_type: HandoffTrigger,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub priority: HandoffPriority,
    pub status: HandoffRequestStatus,
}

/// An outgoing user message held back while disconnected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineQueueEntry {
    /// Client-generated id (uuid), used only for queue bookkeeping.
    pub id: String,
    pub content: String,
    pub enqueued_at: DateTime<Utc>,
}

/// Version of the on-storage [`PersistedState`] format.
///
/// Bump when the schema changes; `load()` discards state written by an
/// unknown version rather than guessing at its shape.
pub const STATE_VERSION: u32 = 1;

/// The single durable client-side record, read once at startup and written
/// on every state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub handoff_status: HandoffStatus,
    #[serde(default)]
    pub offline_queue: Vec<OfflineQueueEntry>,
    /// Timestamp of the newest message the poller has observed.
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl PersistedState {
    /// A fresh un-sessioned state at the current schema version.
    pub fn empty() -> Self {
        Self {
            version: STATE_VERSION,
            session_id: None,
            handoff_status: HandoffStatus::BotOnly,
            offline_queue: Vec::new(),
            last_seen_at: None,
        }
    }
}

impl Default for PersistedState {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handoff_status_defined_edges() {
        use HandoffStatus::*;
        assert!(HandoffStatus::transition_allowed(BotOnly, HandoffRequested));
        assert!(HandoffStatus::transition_allowed(HandoffRequested, HandoffActive));
        assert!(HandoffStatus::transition_allowed(HandoffRequested, OperatorActive));
        assert!(HandoffStatus::transition_allowed(HandoffActive, BotOnly));
        assert!(HandoffStatus::transition_allowed(HandoffActive, Resolved));
        assert!(HandoffStatus::transition_allowed(OperatorActive, BotOnly));
        // Timeout release while still pending.
        assert!(HandoffStatus::transition_allowed(HandoffRequested, BotOnly));
    }

    #[test]
    fn handoff_status_undefined_edges() {
        use HandoffStatus::*;
        assert!(!HandoffStatus::transition_allowed(BotOnly, HandoffActive));
        assert!(!HandoffStatus::transition_allowed(BotOnly, OperatorActive));
        assert!(!HandoffStatus::transition_allowed(BotOnly, Resolved));
        assert!(!HandoffStatus::transition_allowed(Resolved, BotOnly));
        assert!(!HandoffStatus::transition_allowed(Resolved, HandoffRequested));
    }

    #[test]
    fn handoff_status_self_loops_are_allowed() {
        for status in [
            HandoffStatus::BotOnly,
            HandoffStatus::HandoffRequested,
            HandoffStatus::HandoffActive,
            HandoffStatus::OperatorActive,
            HandoffStatus::Resolved,
        ] {
            assert!(HandoffStatus::transition_allowed(status, status));
        }
    }

    #[test]
    fn handoff_engaged_covers_exactly_the_polling_window() {
        assert!(!HandoffStatus::BotOnly.is_handoff_engaged());
        assert!(HandoffStatus::HandoffRequested.is_handoff_engaged());
        assert!(HandoffStatus::HandoffActive.is_handoff_engaged());
        assert!(HandoffStatus::OperatorActive.is_handoff_engaged());
        assert!(!HandoffStatus::Resolved.is_handoff_engaged());
    }

    #[test]
    fn handoff_status_serde_round_trip() {
        use std::str::FromStr;
        for status in [
            HandoffStatus::BotOnly,
            HandoffStatus::HandoffRequested,
            HandoffStatus::HandoffActive,
            HandoffStatus::OperatorActive,
            HandoffStatus::Resolved,
        ] {
            let s = status.to_string();
            assert_eq!(HandoffStatus::from_str(&s).unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{s}\""));
        }
    }

    #[test]
    fn message_deserializes_wire_shape() {
        let json = r#"{
            "id": 42,
            "session_id": "sess-1",
            "sender_type": "operator",
            "sender_name": "Ada",
            "content": "hello",
            "content_type": "markdown",
            "sent_at": "2026-03-01T12:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, MessageId(42));
        assert_eq!(msg.sender_type, SenderType::Operator);
        assert_eq!(msg.content_type, ContentType::Markdown);
        assert_eq!(msg.sender_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn message_optional_fields_default() {
        let json = r#"{
            "id": 1,
            "session_id": "sess-1",
            "sender_type": "bot",
            "content": "hi",
            "sent_at": "2026-03-01T12:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.sender_name.is_none());
        assert_eq!(msg.content_type, ContentType::Text);
    }

    #[test]
    fn persisted_state_empty_is_current_version() {
        let state = PersistedState::empty();
        assert_eq!(state.version, STATE_VERSION);
        assert!(state.session_id.is_none());
        assert_eq!(state.handoff_status, HandoffStatus::BotOnly);
        assert!(state.offline_queue.is_empty());
    }

    #[test]
    fn persisted_state_round_trips_through_json() {
        let state = PersistedState {
            version: STATE_VERSION,
            session_id: Some(SessionId("sess-9".into())),
            handoff_status: HandoffStatus::HandoffActive,
            offline_queue: vec![OfflineQueueEntry {
                id: "q-1".into(),
                content: "queued".into(),
                enqueued_at: Utc::now(),
            }],
            last_seen_at: Some(Utc::now()),
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: PersistedState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
