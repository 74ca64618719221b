// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flush worker: drains the offline queue on reconnect, strictly in
//! enqueue order with a fixed inter-message delay to avoid bursting.
//!
//! An entry whose send fails is re-appended to the tail rather than
//! dropped; the remaining queue depth is reported on a watch channel so
//! the fallback controller can keep the user informed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use convoy_core::types::SenderType;
use convoy_session::SessionManager;

use crate::connectivity::ConnectivityMonitor;
use crate::queue::OfflineQueue;

/// Delay before re-attempting a pass that left failed entries behind.
const FAILED_PASS_RETRY: Duration = Duration::from_secs(5);

/// Drains the offline queue whenever connectivity allows.
pub struct FlushWorker {
    queue: Arc<OfflineQueue>,
    monitor: Arc<ConnectivityMonitor>,
    session: Arc<SessionManager>,
    spacing: Duration,
    depth_tx: watch::Sender<usize>,
}

impl FlushWorker {
    pub fn new(
        queue: Arc<OfflineQueue>,
        monitor: Arc<ConnectivityMonitor>,
        session: Arc<SessionManager>,
        spacing: Duration,
    ) -> (Self, watch::Receiver<usize>) {
        let (depth_tx, depth_rx) = watch::channel(0);
        (
            Self {
                queue,
                monitor,
                session,
                spacing,
                depth_tx,
            },
            depth_rx,
        )
    }

    /// Runs until cancelled: waits for connectivity, flushes one pass, and
    /// repeats while failed entries remain.
    pub async fn run(self, cancel: CancellationToken) {
        let mut online_rx = self.monitor.subscribe();

        loop {
            online_rx.borrow_and_update();

            if !self.monitor.should_queue() && !self.queue.is_empty().await {
                self.flush_pass().await;
            }

            let leftovers = !self.queue.is_empty().await && !self.monitor.should_queue();
            if leftovers {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = online_rx.changed() => if changed.is_err() { return },
                    _ = tokio::time::sleep(FAILED_PASS_RETRY) => {}
                }
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = online_rx.changed() => if changed.is_err() { return },
                }
            }
        }
    }

    /// One pass over the queue: each entry is popped, sent, and on failure
    /// re-appended to the tail. Bounded by the depth at pass start so a
    /// failing entry is not hammered within the same pass.
    async fn flush_pass(&self) {
        let depth = self.queue.len().await;
        info!(queued = depth, "flushing offline queue");

        for _ in 0..depth {
            if self.monitor.should_queue() {
                debug!("connectivity lost mid-flush, pausing");
                break;
            }
            let entry = match self.queue.pop_front().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read offline queue");
                    break;
                }
            };

            match self
                .session
                .send_message(&entry.content, SenderType::User)
                .await
            {
                Ok(message) => {
                    debug!(entry_id = %entry.id, message_id = message.id.0, "queued message delivered");
                }
                Err(e) => {
                    warn!(entry_id = %entry.id, error = %e, "queued message failed, re-queued");
                    if let Err(e) = self.queue.requeue(entry).await {
                        warn!(error = %e, "failed to re-queue entry");
                    }
                }
            }

            self.depth_tx.send_replace(self.queue.len().await);
            tokio::time::sleep(self.spacing).await;
        }

        let remaining = self.queue.len().await;
        self.depth_tx.send_replace(remaining);
        if remaining == 0 {
            info!("offline queue empty");
        } else {
            info!(remaining, "offline queue still has pending messages");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_api::SessionApiClient;
    use convoy_config::{ApiConfig, SessionConfig};
    use convoy_core::traits::SessionStore;
    use convoy_core::types::{HandoffStatus, PersistedState, SessionId};
    use convoy_session::{MemoryStateStore, StateHandle};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    async fn stack(
        server: &MockServer,
    ) -> (Arc<OfflineQueue>, Arc<ConnectivityMonitor>, Arc<SessionManager>) {
        let backend = Arc::new(MemoryStateStore::new());
        backend
            .save(&PersistedState {
                session_id: Some(SessionId("sess-1".into())),
                handoff_status: HandoffStatus::BotOnly,
                ..PersistedState::empty()
            })
            .await
            .unwrap();
        let state = Arc::new(StateHandle::load(backend).await.unwrap());

        let api_config = ApiConfig {
            base_url: server.uri(),
            api_key: None,
            request_timeout_secs: 5,
            poll_timeout_secs: 2,
        };
        let api = Arc::new(SessionApiClient::new(&api_config).unwrap());
        let (manager, _events) =
            SessionManager::new(api, state.clone(), SessionConfig::default()).await;

        (
            Arc::new(OfflineQueue::new(state)),
            Arc::new(ConnectivityMonitor::new()),
            Arc::new(manager),
        )
    }

    fn send_response(id: i64, content: &str) -> ResponseTemplate {
        ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "message": {
                "id": id,
                "session_id": "sess-1",
                "sender_type": "user",
                "content": content,
                "sent_at": "2026-03-01T10:00:00Z"
            }
        }))
    }

    #[tokio::test]
    async fn flush_sends_in_enqueue_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations/messages/send"))
            .respond_with(|req: &Request| {
                let body: serde_json::Value = req.body_json().unwrap();
                let content = body["content"].as_str().unwrap().to_string();
                send_response(1, &content)
            })
            .mount(&server)
            .await;

        let (queue, monitor, session) = stack(&server).await;
        queue.enqueue("first").await.unwrap();
        queue.enqueue("second").await.unwrap();

        monitor.mark_offline();
        let (worker, mut depth_rx) = FlushWorker::new(
            queue.clone(),
            monitor.clone(),
            session,
            Duration::from_millis(10),
        );
        let cancel = CancellationToken::new();
        tokio::spawn(worker.run(cancel.clone()));

        monitor.mark_online();

        // Wait until the queue reports empty.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if *depth_rx.borrow_and_update() == 0 && queue.is_empty().await {
                    break;
                }
                depth_rx.changed().await.unwrap();
            }
        })
        .await
        .expect("queue should drain");

        let requests = server.received_requests().await.unwrap();
        let contents: Vec<String> = requests
            .iter()
            .filter(|r| r.url.path() == "/conversations/messages/send")
            .map(|r| {
                let body: serde_json::Value = r.body_json().unwrap();
                body["content"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(contents, ["first", "second"]);
        cancel.cancel();
    }

    #[tokio::test]
    async fn failed_entry_is_requeued_not_dropped() {
        let server = MockServer::start().await;
        // "doomed" always fails; "fine" succeeds.
        Mock::given(method("POST"))
            .and(path("/conversations/messages/send"))
            .and(body_partial_json(serde_json::json!({"content": "doomed"})))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversations/messages/send"))
            .respond_with(send_response(2, "fine"))
            .mount(&server)
            .await;

        let (queue, monitor, session) = stack(&server).await;
        queue.enqueue("doomed").await.unwrap();
        queue.enqueue("fine").await.unwrap();

        monitor.mark_offline();
        let (worker, _depth_rx) = FlushWorker::new(
            queue.clone(),
            monitor.clone(),
            session,
            Duration::from_millis(10),
        );
        let cancel = CancellationToken::new();
        tokio::spawn(worker.run(cancel.clone()));
        monitor.mark_online();

        // After one pass "fine" is delivered and "doomed" sits at the tail.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let entries = queue.entries().await;
                if entries.len() == 1 && entries[0].content == "doomed" {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("doomed entry should remain queued");
        cancel.cancel();
    }
}
