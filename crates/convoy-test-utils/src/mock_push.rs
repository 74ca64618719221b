// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock push channel for deterministic testing.
//!
//! `MockPushChannel` implements `PushChannel` with injectable envelopes,
//! recorded subscribe attempts, and an optional always-fail subscribe mode
//! for exercising the bounded-retry path.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use convoy_core::ConvoyError;
use convoy_core::traits::{PushChannel, PushEnvelope};
use convoy_core::types::SessionId;

/// A mock push transport for testing.
///
/// Envelopes injected via `inject()` are returned by `receive()` in order.
pub struct MockPushChannel {
    inbound: Arc<Mutex<VecDeque<PushEnvelope>>>,
    notify: Arc<Notify>,
    fail_subscribe: bool,
    attempts: Mutex<u32>,
    subscribed_to: Mutex<Option<SessionId>>,
}

impl MockPushChannel {
    /// A mock channel whose subscribe always succeeds.
    pub fn new() -> Self {
        Self {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            fail_subscribe: false,
            attempts: Mutex::new(0),
            subscribed_to: Mutex::new(None),
        }
    }

    /// A mock channel whose subscribe always fails (transport never ready).
    pub fn failing_subscribe() -> Self {
        Self {
            fail_subscribe: true,
            ..Self::new()
        }
    }

    /// Inject an envelope; the next `receive()` returns it.
    pub async fn inject(&self, envelope: PushEnvelope) {
        self.inbound.lock().await.push_back(envelope);
        self.notify.notify_one();
    }

    /// How many times `subscribe()` was called.
    pub async fn subscribe_attempts(&self) -> u32 {
        *self.attempts.lock().await
    }

    /// The session topic of the last successful subscribe, if any.
    pub async fn subscribed_session(&self) -> Option<SessionId> {
        self.subscribed_to.lock().await.clone()
    }
}

impl Default for MockPushChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushChannel for MockPushChannel {
    async fn subscribe(&self, session_id: &SessionId) -> Result<(), ConvoyError> {
        *self.attempts.lock().await += 1;
        if self.fail_subscribe {
            return Err(ConvoyError::Push {
                message: "push transport not ready".to_string(),
                source: None,
            });
        }
        *self.subscribed_to.lock().await = Some(session_id.clone());
        Ok(())
    }

    async fn receive(&self) -> Result<PushEnvelope, ConvoyError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(envelope) = queue.pop_front() {
                    return Ok(envelope);
                }
            }
            self.notify.notified().await;
        }
    }

    async fn shutdown(&self) -> Result<(), ConvoyError> {
        Ok(())
    }
}
