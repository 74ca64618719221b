// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The widget runtime: wires the session manager, delivery coordinator,
//! offline queue, and fallback controller together, and implements the
//! outgoing send pipeline (retry / queue / surface).
//!
//! Control flow for a user send: offline check (queue) -> transmit -> on
//! failure classify -> retry ledger decision -> sleep-and-retry, enqueue,
//! or surface a fallback presentation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use convoy_api::{HandoffAck, SessionApiClient};
use convoy_config::ConvoyConfig;
use convoy_core::taxonomy::ErrorKind;
use convoy_core::traits::{PushChannel, SessionStore};
use convoy_core::types::{
    HandoffPriority, HandoffStatus, HandoffTrigger, Message, OfflineQueueEntry, SenderType,
    SessionId,
};
use convoy_core::ConvoyError;
use convoy_delivery::{DeliveryCoordinator, DeliveryHandle, WsPushChannel};
use convoy_offline::{ConnectivityMonitor, FlushWorker, OfflineQueue};
use convoy_resilience::{
    FallbackKind, FallbackPresentation, FallbackStateController, RetryDecision, RetryLedger,
    RetryPolicy, classify,
};
use convoy_session::{JsonStateStore, SessionEvent, SessionManager, StateHandle};

use crate::events::EventTracker;

/// What happened to an outgoing user message.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Transmitted; the server-assigned record is returned.
    Delivered(Message),
    /// Held in the offline queue, to be flushed on reconnect.
    Queued(OfflineQueueEntry),
}

/// Builder for [`WidgetRuntime`].
pub struct WidgetRuntimeBuilder {
    config: ConvoyConfig,
    store: Option<Arc<dyn SessionStore>>,
    push: Option<Arc<dyn PushChannel>>,
}

impl WidgetRuntimeBuilder {
    pub fn new(config: ConvoyConfig) -> Self {
        Self {
            config,
            store: None,
            push: None,
        }
    }

    /// Overrides the persisted-state store (default: JSON file from config).
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the push transport (default: WebSocket when configured).
    pub fn with_push_channel(mut self, push: Arc<dyn PushChannel>) -> Self {
        self.push = Some(push);
        self
    }

    /// Assembles the runtime and spawns its background tasks.
    pub async fn build(self) -> Result<WidgetRuntime, ConvoyError> {
        let config = self.config;
        let cancel = CancellationToken::new();

        let api = Arc::new(SessionApiClient::new(&config.api)?);

        let store: Arc<dyn SessionStore> = match self.store {
            Some(store) => store,
            None => Arc::new(JsonStateStore::new(config.storage.state_path.clone())),
        };
        let state = Arc::new(StateHandle::load(store).await?);

        let (manager, session_events) =
            SessionManager::new(api.clone(), state.clone(), config.session.clone()).await;
        let manager = Arc::new(manager);

        let fallback = Arc::new(FallbackStateController::new());
        let monitor = Arc::new(ConnectivityMonitor::new());
        let queue = Arc::new(OfflineQueue::new(state.clone()));
        let tracker = EventTracker::new(api.clone(), config.events.enabled);

        let push: Option<Arc<dyn PushChannel>> = self.push.or_else(|| {
            config
                .delivery
                .push_url
                .as_ref()
                .map(|url| Arc::new(WsPushChannel::new(url.clone())) as Arc<dyn PushChannel>)
        });

        // Inbound delivery: coordinator -> tap (analytics) -> embedder.
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<Message>(256);
        let (ui_tx, ui_rx) = mpsc::channel::<Message>(256);
        let (coordinator, delivery) = DeliveryCoordinator::new(
            manager.clone(),
            api.clone(),
            push,
            config.delivery.clone(),
            inbound_tx,
            cancel.child_token(),
        );
        tokio::spawn(coordinator.run());

        {
            let tracker = tracker.clone();
            let cancel = cancel.child_token();
            tokio::spawn(async move {
                loop {
                    let message = tokio::select! {
                        _ = cancel.cancelled() => return,
                        message = inbound_rx.recv() => match message {
                            Some(message) => message,
                            None => return,
                        },
                    };
                    tracker.message_received(Some(message.session_id.clone()), message.id.0);
                    if ui_tx.send(message).await.is_err() {
                        return;
                    }
                }
            });
        }

        // Connectivity probe loop.
        tokio::spawn(monitor.clone().run_probe(
            api.clone(),
            Duration::from_secs(config.offline.probe_interval_secs),
            cancel.child_token(),
        ));

        // Connectivity transitions feed the fallback controller and analytics.
        {
            let monitor = monitor.clone();
            let fallback = fallback.clone();
            let tracker = tracker.clone();
            let cancel = cancel.child_token();
            tokio::spawn(async move {
                let mut online_rx = monitor.subscribe();
                let mut last = *online_rx.borrow();
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        changed = online_rx.changed() => if changed.is_err() { return },
                    }
                    let online = *online_rx.borrow();
                    // Offline-mode toggles notify without flipping the flag.
                    if online != last {
                        last = online;
                        fallback.on_connectivity(online);
                        tracker.connectivity(None, online);
                    }
                }
            });
        }

        // Offline flush loop; remaining depth feeds the fallback controller.
        let (flush, mut depth_rx) = FlushWorker::new(
            queue.clone(),
            monitor.clone(),
            manager.clone(),
            Duration::from_secs(config.offline.flush_spacing_secs),
        );
        tokio::spawn(flush.run(cancel.child_token()));
        {
            let fallback = fallback.clone();
            let cancel = cancel.child_token();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        changed = depth_rx.changed() => if changed.is_err() { return },
                    }
                    fallback.on_queue_depth(*depth_rx.borrow());
                }
            });
        }

        // Shown presentations are reported to analytics.
        {
            let fallback = fallback.clone();
            let tracker = tracker.clone();
            let cancel = cancel.child_token();
            tokio::spawn(async move {
                let mut fallback_rx = fallback.subscribe();
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        changed = fallback_rx.changed() => if changed.is_err() { return },
                    }
                    let kind = fallback_rx.borrow().as_ref().map(|p| p.kind);
                    if let Some(kind) = kind {
                        tracker.fallback_shown(None, &kind.to_string());
                    }
                }
            });
        }

        let retry = RetryLedger::new(RetryPolicy::new(config.retry.clone()));

        info!("widget runtime started");
        Ok(WidgetRuntime {
            manager,
            fallback,
            monitor,
            queue,
            delivery,
            tracker,
            retry: Mutex::new(retry),
            ui_rx: Some(ui_rx),
            session_events: Some(session_events),
            send_seq: AtomicU64::new(0),
            cancel,
        })
    }
}

/// The assembled delivery-reliability layer of the widget.
pub struct WidgetRuntime {
    manager: Arc<SessionManager>,
    fallback: Arc<FallbackStateController>,
    monitor: Arc<ConnectivityMonitor>,
    queue: Arc<OfflineQueue>,
    delivery: DeliveryHandle,
    tracker: EventTracker,
    retry: Mutex<RetryLedger>,
    ui_rx: Option<mpsc::Receiver<Message>>,
    session_events: Option<mpsc::Receiver<SessionEvent>>,
    send_seq: AtomicU64,
    cancel: CancellationToken,
}

impl WidgetRuntime {
    pub fn builder(config: ConvoyConfig) -> WidgetRuntimeBuilder {
        WidgetRuntimeBuilder::new(config)
    }

    /// Inbound operator/system messages, each message id exactly once.
    /// Returns `None` after the first call.
    pub fn take_message_receiver(&mut self) -> Option<mpsc::Receiver<Message>> {
        self.ui_rx.take()
    }

    /// Session lifecycle notifications. Returns `None` after the first call.
    pub fn take_session_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.session_events.take()
    }

    /// The currently shown fallback presentation, if any.
    pub fn fallback_watch(&self) -> watch::Receiver<Option<FallbackPresentation>> {
        self.fallback.subscribe()
    }

    pub fn status_watch(&self) -> watch::Receiver<HandoffStatus> {
        self.manager.status_watch()
    }

    pub fn current_status(&self) -> HandoffStatus {
        self.manager.current_status()
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn fallback(&self) -> &Arc<FallbackStateController> {
        &self.fallback
    }

    pub async fn queue_depth(&self) -> usize {
        self.queue.len().await
    }

    /// Creates the remote session eagerly (it is otherwise created lazily
    /// on the first outgoing message or handoff request).
    pub async fn start_session(&self) -> Result<SessionId, ConvoyError> {
        self.manager.ensure_session().await
    }

    /// Sends a user message, deciding between transmit, queue, and surface.
    ///
    /// Transient failures are retried per the policy engine without
    /// surfacing anything; exhausted network failures queue the message and
    /// flip the connectivity signal; everything else surfaces a fallback
    /// presentation.
    pub async fn send_user_message(&self, content: &str) -> Result<SendOutcome, ConvoyError> {
        if self.monitor.should_queue() {
            return self.queue_message(content).await;
        }

        if let Some(active) = self.fallback.active()
            && active.kind == FallbackKind::RateLimited
        {
            // No send is attempted during the rate-limit window.
            return Err(ConvoyError::Api {
                status: 429,
                message: "rate limited, sends blocked until the window elapses".to_string(),
                retry_after_ms: active.countdown_ms,
            });
        }

        let op = format!("send:{}", self.send_seq.fetch_add(1, Ordering::Relaxed));

        loop {
            match self.manager.send_message(content, SenderType::User).await {
                Ok(message) => {
                    self.retry.lock().await.on_success(&op);
                    // The send response is this client's own message; neither
                    // inbound channel may replay it to the UI boundary.
                    self.delivery.mark_processed(message.id).await;
                    self.monitor.mark_online();
                    self.tracker
                        .message_sent(Some(message.session_id.clone()), content.len());
                    return Ok(SendOutcome::Delivered(message));
                }
                Err(e) => {
                    let classified = classify(&e);
                    self.tracker
                        .message_error(None, &classified.kind.to_string());

                    let decision = self.retry.lock().await.on_failure(&op, &classified);
                    match decision {
                        RetryDecision::RetryAfter(delay) => {
                            debug!(op, delay_ms = delay.as_millis() as u64, "retrying send");
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::Blocked(delay) => {
                            self.fallback.present_rate_limited(delay);
                            return Err(e);
                        }
                        RetryDecision::Exhausted if classified.kind == ErrorKind::Network => {
                            // The network is gone: flip the connectivity
                            // signal and keep the message instead of losing it.
                            warn!(op, "network retries exhausted, queueing message");
                            self.monitor.mark_offline();
                            return self.queue_message(content).await;
                        }
                        RetryDecision::Exhausted | RetryDecision::NotRetryable => {
                            self.fallback.on_surfaced_error(&classified);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn queue_message(&self, content: &str) -> Result<SendOutcome, ConvoyError> {
        let entry = self.queue.enqueue(content).await?;
        self.fallback.on_queue_depth(self.queue.len().await);
        Ok(SendOutcome::Queued(entry))
    }

    /// Requests a handoff to a human operator, retrying transient failures.
    pub async fn request_handoff(
        &self,
        trigger: HandoffTrigger,
        reason: Option<String>,
        priority: HandoffPriority,
    ) -> Result<HandoffAck, ConvoyError> {
        let op = "handoff";
        loop {
            match self
                .manager
                .request_handoff(trigger, reason.clone(), priority)
                .await
            {
                Ok(ack) => {
                    self.retry.lock().await.on_success(op);
                    return Ok(ack);
                }
                Err(e) => {
                    let classified = classify(&e);
                    let decision = self.retry.lock().await.on_failure(op, &classified);
                    match decision {
                        RetryDecision::RetryAfter(delay) => {
                            debug!(delay_ms = delay.as_millis() as u64, "retrying handoff request");
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::Blocked(delay) => {
                            self.fallback.present_rate_limited(delay);
                            return Err(e);
                        }
                        RetryDecision::Exhausted | RetryDecision::NotRetryable => {
                            self.fallback.on_surfaced_error(&classified);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Manual "retry now": clears attempt counters and the active
    /// presentation, and treats connectivity as restored until proven
    /// otherwise.
    pub async fn retry_now(&self) {
        self.retry.lock().await.reset();
        self.fallback.clear_all();
        self.monitor.mark_online();
    }

    /// Toggles explicit offline mode (messages queue while enabled).
    pub fn set_offline_mode(&self, enabled: bool) {
        self.monitor.set_offline_mode(enabled);
        if enabled {
            // Queueing is the chosen behavior; the blocking offline
            // presentation no longer applies.
            self.fallback.clear(FallbackKind::Offline);
        }
    }

    /// Stops all background tasks. Cancellation stops future scheduled
    /// iterations without waiting for in-flight requests.
    pub fn shutdown(&self) {
        info!("widget runtime shutting down");
        self.cancel.cancel();
    }
}

impl Drop for WidgetRuntime {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
