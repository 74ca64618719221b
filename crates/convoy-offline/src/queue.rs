// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered buffer of not-yet-sent user messages.
//!
//! Entries live in the persisted client state, so a widget reload while
//! offline does not lose queued messages. Order is strictly enqueue order;
//! a failed flush re-appends to the tail rather than dropping.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use convoy_core::ConvoyError;
use convoy_core::types::OfflineQueueEntry;
use convoy_session::StateHandle;

/// The offline outgoing-message queue, persisted in the client state.
pub struct OfflineQueue {
    state: Arc<StateHandle>,
}

impl OfflineQueue {
    pub fn new(state: Arc<StateHandle>) -> Self {
        Self { state }
    }

    /// Appends a message to the queue instead of transmitting it.
    pub async fn enqueue(&self, content: &str) -> Result<OfflineQueueEntry, ConvoyError> {
        let entry = OfflineQueueEntry {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            enqueued_at: Utc::now(),
        };
        let state = self
            .state
            .update(|s| s.offline_queue.push(entry.clone()))
            .await?;
        info!(
            entry_id = %entry.id,
            depth = state.offline_queue.len(),
            "message queued while offline"
        );
        Ok(entry)
    }

    /// Removes and returns the oldest entry, if any.
    pub async fn pop_front(&self) -> Result<Option<OfflineQueueEntry>, ConvoyError> {
        let mut popped = None;
        self.state
            .update(|s| {
                if !s.offline_queue.is_empty() {
                    popped = Some(s.offline_queue.remove(0));
                }
            })
            .await?;
        Ok(popped)
    }

    /// Re-appends a failed entry to the tail.
    pub async fn requeue(&self, entry: OfflineQueueEntry) -> Result<(), ConvoyError> {
        self.state
            .update(|s| s.offline_queue.push(entry))
            .await?;
        Ok(())
    }

    /// Current queue depth.
    pub async fn len(&self) -> usize {
        self.state.snapshot().await.offline_queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// A copy of the queued entries in order.
    pub async fn entries(&self) -> Vec<OfflineQueueEntry> {
        self.state.snapshot().await.offline_queue
    }
}
