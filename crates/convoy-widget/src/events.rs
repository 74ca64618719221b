// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort analytics event emission.
//!
//! Events are fire-and-forget: failures are logged at debug level and never
//! propagate into the delivery pipeline.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use convoy_api::{SessionApiClient, WidgetEventBody};
use convoy_core::types::SessionId;

/// Analytics event type names.
pub mod event_types {
    pub const MESSAGE_SENT: &str = "message_sent";
    pub const MESSAGE_RECEIVED: &str = "message_received";
    pub const MESSAGE_ERROR: &str = "message_error";
    pub const FALLBACK_STATE_SHOWN: &str = "fallback_state_shown";
    pub const CONNECTION_LOST: &str = "connection_lost";
    pub const CONNECTION_RESTORED: &str = "connection_restored";
}

/// Emits widget analytics events without blocking the caller.
#[derive(Clone)]
pub struct EventTracker {
    api: Arc<SessionApiClient>,
    enabled: bool,
}

impl EventTracker {
    pub fn new(api: Arc<SessionApiClient>, enabled: bool) -> Self {
        Self { api, enabled }
    }

    /// Spawns a fire-and-forget event post.
    pub fn track(
        &self,
        event_type: &'static str,
        session_id: Option<SessionId>,
        event_data: serde_json::Value,
    ) {
        if !self.enabled {
            return;
        }
        let api = self.api.clone();
        let body = WidgetEventBody {
            event_type: event_type.to_string(),
            session_id,
            event_data,
            occurred_at: Utc::now(),
        };
        tokio::spawn(async move {
            if let Err(e) = api.track_event(&body).await {
                debug!(event_type = %body.event_type, error = %e, "analytics event dropped");
            }
        });
    }

    pub fn message_sent(&self, session_id: Option<SessionId>, content_length: usize) {
        self.track(
            event_types::MESSAGE_SENT,
            session_id,
            serde_json::json!({"content_length": content_length}),
        );
    }

    pub fn message_received(&self, session_id: Option<SessionId>, message_id: i64) {
        self.track(
            event_types::MESSAGE_RECEIVED,
            session_id,
            serde_json::json!({"message_id": message_id}),
        );
    }

    pub fn message_error(&self, session_id: Option<SessionId>, kind: &str) {
        self.track(
            event_types::MESSAGE_ERROR,
            session_id,
            serde_json::json!({"kind": kind}),
        );
    }

    pub fn fallback_shown(&self, session_id: Option<SessionId>, kind: &str) {
        self.track(
            event_types::FALLBACK_STATE_SHOWN,
            session_id,
            serde_json::json!({"kind": kind}),
        );
    }

    pub fn connectivity(&self, session_id: Option<SessionId>, online: bool) {
        let event_type = if online {
            event_types::CONNECTION_RESTORED
        } else {
            event_types::CONNECTION_LOST
        };
        self.track(event_type, session_id, serde_json::json!({}));
    }
}
