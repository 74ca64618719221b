// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dual-channel inbound delivery with deduplication.
//!
//! Push and poll are two producers feeding one deduplicating consumer over
//! an mpsc channel. The consumer is the only owner of the processed-id set,
//! so the "already processed?" check and the "mark processed" mutation can
//! never interleave with another delivery attempt for the same id.
//!
//! The poll loop runs exactly while the handoff status is engaged
//! (requested/active/operator); push absence never prevents delivery, only
//! increases latency.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use convoy_api::{SessionApiClient, is_not_found};
use convoy_config::DeliveryConfig;
use convoy_core::traits::PushChannel;
use convoy_core::types::{Message, MessageId, SenderType, SessionSnapshot};
use convoy_session::SessionManager;

/// Broadcast event names accepted for inbound messages.
///
/// Two names are accepted for the same payload shape, for compatibility
/// with differing broadcast-naming conventions.
pub mod event_names {
    pub const MESSAGE_SENT: &str = "message.sent";
    pub const MESSAGE_CREATED: &str = "message.created";

    /// Whether a broadcast event name carries an inbound message.
    pub fn is_message_event(name: &str) -> bool {
        name == MESSAGE_SENT || name == MESSAGE_CREATED
    }
}

/// Which producer delivered a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySource {
    Push,
    Poll,
}

/// Internal event stream feeding the deduplicating consumer.
#[derive(Debug)]
enum DeliveryEvent {
    Message {
        message: Message,
        source: DeliverySource,
    },
    Snapshot(SessionSnapshot),
    /// Mark an id processed without forwarding (the sender's own message,
    /// already echoed at the UI boundary).
    MarkProcessed(MessageId),
}

/// Cloneable handle for feeding control events into the consumer.
#[derive(Clone)]
pub struct DeliveryHandle {
    tx: mpsc::Sender<DeliveryEvent>,
}

impl DeliveryHandle {
    /// Marks a message id as already delivered so neither channel replays
    /// it to the UI boundary.
    pub async fn mark_processed(&self, id: MessageId) {
        if self.tx.send(DeliveryEvent::MarkProcessed(id)).await.is_err() {
            debug!("delivery coordinator gone, mark_processed dropped");
        }
    }
}

/// Runs the push subscription and the polling loop, deduplicates inbound
/// messages, and forwards new ones to the UI boundary.
pub struct DeliveryCoordinator {
    session: Arc<SessionManager>,
    api: Arc<SessionApiClient>,
    push: Option<Arc<dyn PushChannel>>,
    config: DeliveryConfig,
    ui_tx: mpsc::Sender<Message>,
    cancel: CancellationToken,
    rx: mpsc::Receiver<DeliveryEvent>,
    tx: mpsc::Sender<DeliveryEvent>,
}

impl DeliveryCoordinator {
    pub fn new(
        session: Arc<SessionManager>,
        api: Arc<SessionApiClient>,
        push: Option<Arc<dyn PushChannel>>,
        config: DeliveryConfig,
        ui_tx: mpsc::Sender<Message>,
        cancel: CancellationToken,
    ) -> (Self, DeliveryHandle) {
        let (tx, rx) = mpsc::channel(256);
        let handle = DeliveryHandle { tx: tx.clone() };
        let coordinator = Self {
            session,
            api,
            push,
            config,
            ui_tx,
            cancel,
            rx,
            tx,
        };
        (coordinator, handle)
    }

    /// Spawns the producers and runs the deduplicating consumer until the
    /// cancellation token fires or the UI receiver is dropped.
    pub async fn run(mut self) {
        if let Some(push) = self.push.clone() {
            tokio::spawn(run_push_producer(
                push,
                self.session.clone(),
                self.config.clone(),
                self.tx.clone(),
                self.cancel.child_token(),
            ));
        }

        tokio::spawn(run_poll_supervisor(
            self.api.clone(),
            self.session.clone(),
            self.config.clone(),
            self.tx.clone(),
            self.cancel.child_token(),
        ));

        // The consumer exclusively owns the processed-id set; check, mark,
        // and forward happen sequentially within this task.
        let mut processed: HashSet<MessageId> = HashSet::new();

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = self.rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                DeliveryEvent::Snapshot(snapshot) => {
                    if let Err(e) = self.session.observe_status(&snapshot).await {
                        warn!(error = %e, "failed to apply observed session snapshot");
                    }
                }
                DeliveryEvent::MarkProcessed(id) => {
                    processed.insert(id);
                }
                DeliveryEvent::Message { message, source } => {
                    if !processed.insert(message.id) {
                        debug!(message_id = message.id.0, ?source, "duplicate suppressed");
                        continue;
                    }
                    if let Err(e) = self.session.record_last_seen(message.sent_at).await {
                        warn!(error = %e, "failed to persist last-seen cursor");
                    }
                    // The user's own messages are echoed optimistically at
                    // the UI boundary; never re-deliver them.
                    if message.sender_type == SenderType::User {
                        debug!(message_id = message.id.0, "own message, not forwarded");
                        continue;
                    }
                    debug!(message_id = message.id.0, ?source, "forwarding inbound message");
                    if self.ui_tx.send(message).await.is_err() {
                        info!("ui receiver dropped, stopping delivery");
                        break;
                    }
                }
            }
        }
    }
}

/// Push producer: subscribe with bounded attempts, then forward events.
///
/// Gives up silently once the attempt budget is spent; the poll fallback
/// remains the correctness backstop while a handoff is outstanding.
async fn run_push_producer(
    push: Arc<dyn PushChannel>,
    session: Arc<SessionManager>,
    config: DeliveryConfig,
    tx: mpsc::Sender<DeliveryEvent>,
    cancel: CancellationToken,
) {
    // Wait until a session exists; push topics are per-session.
    let session_id = loop {
        if let Some(snap) = session.restore_session() {
            break snap.session_id;
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    };

    let retry_delay = Duration::from_secs(config.subscribe_retry_secs);
    let mut subscribed = false;
    for attempt in 1..=config.subscribe_max_attempts {
        match push.subscribe(&session_id).await {
            Ok(()) => {
                subscribed = true;
                break;
            }
            Err(e) => {
                debug!(attempt, error = %e, "push subscribe attempt failed");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }
        }
    }
    if !subscribed {
        info!(
            attempts = config.subscribe_max_attempts,
            "push unavailable, relying on poll fallback"
        );
        return;
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = push.shutdown().await;
                return;
            }
            result = push.receive() => match result {
                Ok(envelope) => {
                    if !event_names::is_message_event(&envelope.event) {
                        debug!(event = %envelope.event, "ignoring non-message push event");
                        continue;
                    }
                    if let Some(snapshot) = envelope.session
                        && tx.send(DeliveryEvent::Snapshot(snapshot)).await.is_err()
                    {
                        return;
                    }
                    let event = DeliveryEvent::Message {
                        message: envelope.message,
                        source: DeliverySource::Push,
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "push channel failed, relying on poll fallback");
                    return;
                }
            }
        }
    }
}

/// Starts/stops the poller as the handoff status crosses the engaged
/// boundary.
async fn run_poll_supervisor(
    api: Arc<SessionApiClient>,
    session: Arc<SessionManager>,
    config: DeliveryConfig,
    tx: mpsc::Sender<DeliveryEvent>,
    cancel: CancellationToken,
) {
    let mut status_rx = session.status_watch();
    let mut poller: Option<CancellationToken> = None;

    loop {
        let engaged = status_rx.borrow_and_update().is_handoff_engaged();

        if engaged && poller.is_none() {
            let token = cancel.child_token();
            tokio::spawn(run_poller(
                api.clone(),
                session.clone(),
                config.clone(),
                tx.clone(),
                token.clone(),
            ));
            poller = Some(token);
        } else if !engaged && let Some(token) = poller.take() {
            info!("handoff released, stopping poll fallback");
            token.cancel();
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                if let Some(token) = poller.take() {
                    token.cancel();
                }
                return;
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

/// Fixed-cadence poll loop: fetch messages after the last-seen cursor plus
/// the session snapshot. A not-found response invalidates the session.
async fn run_poller(
    api: Arc<SessionApiClient>,
    session: Arc<SessionManager>,
    config: DeliveryConfig,
    tx: mpsc::Sender<DeliveryEvent>,
    cancel: CancellationToken,
) {
    info!("poll fallback started");
    let interval = Duration::from_secs(config.poll_interval_secs);

    loop {
        let Some(snap) = session.restore_session() else {
            return;
        };
        let since = session.last_seen().await;

        match api.fetch_messages(&snap.session_id, since).await {
            Ok(update) => {
                if tx
                    .send(DeliveryEvent::Snapshot(update.conversation))
                    .await
                    .is_err()
                {
                    return;
                }
                for message in update.messages {
                    let event = DeliveryEvent::Message {
                        message,
                        source: DeliverySource::Poll,
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) if is_not_found(&e) => {
                // Session deleted server-side: clear local state entirely
                // and stop polling (the status flips back to bot_only).
                if let Err(e) = session.invalidate().await {
                    warn!(error = %e, "failed to invalidate session");
                }
                return;
            }
            Err(e) => {
                warn!(error = %e, "poll fetch failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use convoy_config::{ApiConfig, SessionConfig};
    use convoy_core::traits::SessionStore;
    use convoy_core::types::{ContentType, HandoffStatus, PersistedState, SessionId};
    use convoy_session::{MemoryStateStore, StateHandle};
    use convoy_test_utils::MockPushChannel;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn operator_message(id: i64, content: &str) -> Message {
        Message {
            id: MessageId(id),
            session_id: SessionId("sess-1".into()),
            sender_type: SenderType::Operator,
            sender_name: Some("Ada".into()),
            content: content.into(),
            content_type: ContentType::Text,
            sent_at: Utc::now(),
        }
    }

    async fn seeded_state(status: HandoffStatus) -> Arc<StateHandle> {
        let backend = Arc::new(MemoryStateStore::new());
        backend
            .save(&PersistedState {
                session_id: Some(SessionId("sess-1".into())),
                handoff_status: status,
                ..PersistedState::empty()
            })
            .await
            .unwrap();
        Arc::new(StateHandle::load(backend).await.unwrap())
    }

    async fn setup(
        server: &MockServer,
        status: HandoffStatus,
        push: Option<Arc<dyn PushChannel>>,
        poll_interval_secs: u64,
    ) -> (
        Arc<SessionManager>,
        DeliveryHandle,
        mpsc::Receiver<Message>,
        CancellationToken,
    ) {
        let api_config = ApiConfig {
            base_url: server.uri(),
            api_key: None,
            request_timeout_secs: 5,
            poll_timeout_secs: 2,
        };
        let api = Arc::new(SessionApiClient::new(&api_config).unwrap());
        let state = seeded_state(status).await;
        let (manager, _events) =
            SessionManager::new(api.clone(), state, SessionConfig::default()).await;
        let manager = Arc::new(manager);

        let config = DeliveryConfig {
            push_url: None,
            poll_interval_secs,
            subscribe_max_attempts: 2,
            subscribe_retry_secs: 0,
        };
        let (ui_tx, ui_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let (coordinator, handle) = DeliveryCoordinator::new(
            manager.clone(),
            api,
            push,
            config,
            ui_tx,
            cancel.clone(),
        );
        tokio::spawn(coordinator.run());
        (manager, handle, ui_rx, cancel)
    }

    fn poll_body(status: &str, messages: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "conversation": {"session_id": "sess-1", "handoff_status": status},
            "messages": messages
        })
    }

    #[tokio::test]
    async fn message_replayed_on_both_channels_is_shown_once() {
        let server = MockServer::start().await;
        let msg = operator_message(1, "hello once");
        Mock::given(method("GET"))
            .and(path("/conversations/sess-1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(poll_body(
                "handoff_active",
                serde_json::json!([msg]),
            )))
            .mount(&server)
            .await;

        let push = Arc::new(MockPushChannel::new());
        let (_manager, _handle, mut ui_rx, cancel) = setup(
            &server,
            HandoffStatus::HandoffActive,
            Some(push.clone() as Arc<dyn PushChannel>),
            60,
        )
        .await;

        // First delivery via poll, replay via push.
        let first = tokio::time::timeout(Duration::from_secs(5), ui_rx.recv())
            .await
            .expect("poll delivery")
            .unwrap();
        assert_eq!(first.id, MessageId(1));

        push.inject(convoy_core::PushEnvelope {
            event: event_names::MESSAGE_SENT.to_string(),
            message: msg.clone(),
            session: None,
        })
        .await;

        // The replay must be suppressed.
        let replay = tokio::time::timeout(Duration::from_millis(300), ui_rx.recv()).await;
        assert!(replay.is_err(), "duplicate reached the ui boundary");
        cancel.cancel();
    }

    #[tokio::test]
    async fn own_user_messages_are_not_forwarded() {
        let server = MockServer::start().await;
        let mut user_msg = operator_message(2, "typed by me");
        user_msg.sender_type = SenderType::User;
        let op_msg = operator_message(3, "from support");
        Mock::given(method("GET"))
            .and(path("/conversations/sess-1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(poll_body(
                "handoff_active",
                serde_json::json!([user_msg, op_msg]),
            )))
            .mount(&server)
            .await;

        let (_manager, _handle, mut ui_rx, cancel) =
            setup(&server, HandoffStatus::HandoffActive, None, 60).await;

        let delivered = tokio::time::timeout(Duration::from_secs(5), ui_rx.recv())
            .await
            .expect("delivery")
            .unwrap();
        assert_eq!(delivered.id, MessageId(3));
        assert!(ui_rx.try_recv().is_err());
        cancel.cancel();
    }

    #[tokio::test]
    async fn marked_ids_are_never_replayed() {
        let server = MockServer::start().await;
        let msg = operator_message(4, "already echoed");
        // Delay the poll response so the mark always lands first.
        Mock::given(method("GET"))
            .and(path("/conversations/sess-1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(300))
                    .set_body_json(poll_body("handoff_active", serde_json::json!([msg]))),
            )
            .mount(&server)
            .await;

        let push = Arc::new(MockPushChannel::new());
        let (_manager, handle, mut ui_rx, cancel) = setup(
            &server,
            HandoffStatus::HandoffActive,
            Some(push as Arc<dyn PushChannel>),
            60,
        )
        .await;

        handle.mark_processed(MessageId(4)).await;

        let delivered = tokio::time::timeout(Duration::from_millis(800), ui_rx.recv()).await;
        if let Ok(Some(m)) = delivered {
            panic!("marked message reached the ui boundary: {m:?}");
        }
        cancel.cancel();
    }

    #[tokio::test]
    async fn poll_snapshot_drives_status_and_release_stops_poller() {
        let server = MockServer::start().await;
        // First poll reports the operator released the conversation.
        Mock::given(method("GET"))
            .and(path("/conversations/sess-1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(poll_body(
                "bot_only",
                serde_json::json!([]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let (manager, _handle, _ui_rx, cancel) =
            setup(&server, HandoffStatus::HandoffActive, None, 1).await;

        let mut status_rx = manager.status_watch();
        tokio::time::timeout(Duration::from_secs(5), async {
            while *status_rx.borrow_and_update() != HandoffStatus::BotOnly {
                status_rx.changed().await.unwrap();
            }
        })
        .await
        .expect("status should return to bot_only");

        // The poller stops; with expect(1) the mock fails on extra polls.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        cancel.cancel();
    }

    #[tokio::test]
    async fn poll_404_invalidates_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations/sess-1/messages"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (manager, _handle, _ui_rx, cancel) =
            setup(&server, HandoffStatus::HandoffActive, None, 1).await;

        tokio::time::timeout(Duration::from_secs(5), async {
            let mut status_rx = manager.status_watch();
            while *status_rx.borrow_and_update() != HandoffStatus::BotOnly {
                status_rx.changed().await.unwrap();
            }
        })
        .await
        .expect("invalidated session returns to bot_only");

        assert!(manager.restore_session().is_none());
        cancel.cancel();
    }

    #[tokio::test]
    async fn push_gives_up_after_bounded_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations/sess-1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(poll_body(
                "handoff_active",
                serde_json::json!([operator_message(6, "still delivered")]),
            )))
            .mount(&server)
            .await;

        let push = Arc::new(MockPushChannel::failing_subscribe());
        let (_manager, _handle, mut ui_rx, cancel) = setup(
            &server,
            HandoffStatus::HandoffActive,
            Some(push.clone() as Arc<dyn PushChannel>),
            60,
        )
        .await;

        // Push never comes up, but the poll backstop still delivers.
        let delivered = tokio::time::timeout(Duration::from_secs(5), ui_rx.recv())
            .await
            .expect("poll delivery")
            .unwrap();
        assert_eq!(delivered.id, MessageId(6));
        assert!(push.subscribe_attempts().await <= 2);
        cancel.cancel();
    }

    #[tokio::test]
    async fn event_name_compatibility() {
        assert!(event_names::is_message_event(event_names::MESSAGE_SENT));
        assert!(event_names::is_message_event(event_names::MESSAGE_CREATED));
        assert!(!event_names::is_message_event("presence.joined"));
    }
}
