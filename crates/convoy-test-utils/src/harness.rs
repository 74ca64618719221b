// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete widget runtime against a wiremock
//! Session API, an in-memory state store, and a mock push channel. Tests
//! mount their own endpoint mocks on `server` and drive the runtime.

use std::time::Duration;

use std::sync::Arc;

use tokio::sync::mpsc;
use wiremock::MockServer;

use convoy_core::types::{Message, PersistedState};
use convoy_config::ConvoyConfig;
use convoy_session::MemoryStateStore;
use convoy_widget::WidgetRuntime;

use crate::mock_push::MockPushChannel;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    persisted: Option<PersistedState>,
    poll_interval_secs: u64,
    flush_spacing_secs: u64,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            persisted: None,
            poll_interval_secs: 1,
            flush_spacing_secs: 0,
        }
    }

    /// Seed the state store before the runtime boots (restored session).
    pub fn with_persisted_state(mut self, state: PersistedState) -> Self {
        self.persisted = Some(state);
        self
    }

    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn with_flush_spacing(mut self, secs: u64) -> Self {
        self.flush_spacing_secs = secs;
        self
    }

    /// Build the harness: wiremock server, memory store, mock push, runtime.
    pub async fn build(self) -> TestHarness {
        // Make `RUST_LOG`-filtered tracing available in test runs.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let server = MockServer::start().await;

        let store = Arc::new(MemoryStateStore::new());
        if let Some(state) = &self.persisted {
            use convoy_core::traits::SessionStore;
            store.save(state).await.expect("seed state");
        }

        let mut config = ConvoyConfig::default();
        config.api.base_url = server.uri();
        config.api.request_timeout_secs = 5;
        config.api.poll_timeout_secs = 2;
        config.delivery.poll_interval_secs = self.poll_interval_secs;
        config.delivery.subscribe_max_attempts = 2;
        config.delivery.subscribe_retry_secs = 0;
        config.offline.flush_spacing_secs = self.flush_spacing_secs;
        // Keep periodic probes out of short-lived tests.
        config.offline.probe_interval_secs = 3600;
        config.events.enabled = false;

        let push = Arc::new(MockPushChannel::new());
        let mut runtime = WidgetRuntime::builder(config)
            .with_store(store)
            .with_push_channel(push.clone())
            .build()
            .await
            .expect("runtime build");

        let messages = runtime.take_message_receiver().expect("message receiver");

        TestHarness {
            server,
            runtime,
            push,
            messages,
        }
    }
}

/// A complete test environment around [`WidgetRuntime`].
pub struct TestHarness {
    /// The mocked Session API; mount endpoint mocks here.
    pub server: MockServer,
    /// The runtime under test.
    pub runtime: WidgetRuntime,
    /// The mock push transport; inject envelopes to simulate broadcasts.
    pub push: Arc<MockPushChannel>,
    /// Inbound messages as forwarded to the UI boundary.
    pub messages: mpsc::Receiver<Message>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Waits for the next inbound message or panics after `timeout`.
    pub async fn expect_message(&mut self, timeout: Duration) -> Message {
        tokio::time::timeout(timeout, self.messages.recv())
            .await
            .expect("timed out waiting for inbound message")
            .expect("message channel closed")
    }

    /// Asserts that no inbound message arrives within `window`.
    pub async fn expect_no_message(&mut self, window: Duration) {
        if let Ok(Some(message)) = tokio::time::timeout(window, self.messages.recv()).await {
            panic!("unexpected inbound message: {message:?}");
        }
    }
}

/// JSON body for a successful `POST /conversations/start`.
pub fn start_session_body(session_id: &str) -> serde_json::Value {
    serde_json::json!({
        "session": {"session_id": session_id, "handoff_status": "bot_only"}
    })
}

/// JSON body for a successful `POST /conversations/messages/send` echoing
/// the given content.
pub fn send_message_body(id: i64, session_id: &str, content: &str) -> serde_json::Value {
    serde_json::json!({
        "message": {
            "id": id,
            "session_id": session_id,
            "sender_type": "user",
            "content": content,
            "sent_at": "2026-03-01T10:00:00Z"
        }
    })
}

/// JSON body for `GET /conversations/{id}/messages`.
pub fn poll_body(
    session_id: &str,
    handoff_status: &str,
    messages: serde_json::Value,
) -> serde_json::Value {
    serde_json::json!({
        "conversation": {"session_id": session_id, "handoff_status": handoff_status},
        "messages": messages
    })
}

/// JSON for one operator message inside a poll body or push envelope.
pub fn operator_message_json(id: i64, session_id: &str, content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "session_id": session_id,
        "sender_type": "operator",
        "sender_name": "Ada",
        "content": content,
        "sent_at": "2026-03-01T10:00:05Z"
    })
}
