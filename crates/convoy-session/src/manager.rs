// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SessionManager: owns the conversation/handoff state machine and its
//! persisted representation.
//!
//! Exposes "send message", "request handoff", and status observation; the
//! current handoff status is published on a watch channel that gates the
//! poll fallback in `convoy-delivery`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

use convoy_api::{
    HandoffAck, RequestHandoffBody, SendMessageRequest, SessionApiClient,
    StartConversationRequest,
};
use convoy_config::SessionConfig;
use convoy_core::ConvoyError;
use convoy_core::types::{
    ContentType, HandoffPriority, HandoffStatus, HandoffTrigger, Message, SenderType, SessionId,
    SessionSnapshot,
};

use crate::state::StateHandle;

/// Notifications emitted by the session manager, consumed by the runtime
/// and the fallback controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A remote session was created.
    SessionStarted { session_id: SessionId },
    /// The handoff status changed along a defined edge.
    StatusChanged {
        from: HandoffStatus,
        to: HandoffStatus,
    },
    /// The server accepted a handoff request.
    HandoffRequested { id: i64 },
    /// The server no longer knows the session; local state was cleared.
    SessionInvalidated,
}

/// Owns the conversation/handoff state machine.
pub struct SessionManager {
    api: Arc<SessionApiClient>,
    state: Arc<StateHandle>,
    config: SessionConfig,
    /// Cached snapshot read by the delivery paths; written only here.
    cached: ArcSwapOption<SessionSnapshot>,
    /// Sticky: one failed session creation suppresses retries until reload.
    session_unavailable: AtomicBool,
    /// Serializes concurrent session creation.
    start_lock: Mutex<()>,
    status_tx: watch::Sender<HandoffStatus>,
    events_tx: mpsc::Sender<SessionEvent>,
}

impl SessionManager {
    /// Builds the manager, restoring the persisted session without a
    /// network call.
    pub async fn new(
        api: Arc<SessionApiClient>,
        state: Arc<StateHandle>,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let persisted = state.snapshot().await;
        let initial_status = persisted.handoff_status;
        let cached = persisted.session_id.map(|session_id| {
            Arc::new(SessionSnapshot {
                session_id,
                handoff_status: initial_status,
            })
        });
        if let Some(snap) = &cached {
            info!(session_id = %snap.session_id, status = %initial_status, "session restored from storage");
        }

        let (status_tx, _) = watch::channel(initial_status);
        let (events_tx, events_rx) = mpsc::channel(32);

        let manager = Self {
            api,
            state,
            config,
            cached: ArcSwapOption::new(cached),
            session_unavailable: AtomicBool::new(false),
            start_lock: Mutex::new(()),
            status_tx,
            events_tx,
        };
        (manager, events_rx)
    }

    /// The restored/cached session snapshot, if any.
    pub fn restore_session(&self) -> Option<SessionSnapshot> {
        self.cached.load_full().map(|s| (*s).clone())
    }

    /// The current handoff status.
    pub fn current_status(&self) -> HandoffStatus {
        *self.status_tx.borrow()
    }

    /// Watch channel carrying the handoff status; the poll fallback runs
    /// while the status is handoff-engaged.
    pub fn status_watch(&self) -> watch::Receiver<HandoffStatus> {
        self.status_tx.subscribe()
    }

    /// Whether session creation failed earlier and is being suppressed.
    pub fn is_session_unavailable(&self) -> bool {
        self.session_unavailable.load(Ordering::Relaxed)
    }

    /// Returns the active session id, creating a remote session if none is
    /// cached.
    ///
    /// One creation failure sets the sticky unavailable flag: the widget
    /// degrades to bot-only functionality and does not hammer the endpoint.
    pub async fn ensure_session(&self) -> Result<SessionId, ConvoyError> {
        if let Some(snap) = self.cached.load_full() {
            return Ok(snap.session_id.clone());
        }
        if self.is_session_unavailable() {
            return Err(ConvoyError::SessionUnavailable);
        }

        let _guard = self.start_lock.lock().await;
        // Another caller may have created the session while we waited.
        if let Some(snap) = self.cached.load_full() {
            return Ok(snap.session_id.clone());
        }

        let request = StartConversationRequest {
            tenant_id: self.config.tenant_id,
            widget_config_id: self.config.widget_config_id,
            channel: self.config.channel.clone(),
            user_agent: self.config.user_agent.clone(),
            referrer_url: self.config.referrer_url.clone(),
        };

        match self.api.start_conversation(&request).await {
            Ok(resp) => {
                let snapshot = resp.session;
                info!(session_id = %snapshot.session_id, "conversation session started");
                self.state
                    .update(|s| {
                        s.session_id = Some(snapshot.session_id.clone());
                        s.handoff_status = snapshot.handoff_status;
                    })
                    .await?;
                self.status_tx.send_replace(snapshot.handoff_status);
                self.cached.store(Some(Arc::new(snapshot.clone())));
                self.emit(SessionEvent::SessionStarted {
                    session_id: snapshot.session_id.clone(),
                });
                Ok(snapshot.session_id)
            }
            Err(e) => {
                warn!(error = %e, "session creation failed, degrading to bot-only");
                self.session_unavailable.store(true, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Transmits a message attributed to the given sender.
    ///
    /// Transmission failures propagate to the caller for classification;
    /// the optimistic local echo happens at the UI boundary, never here.
    pub async fn send_message(
        &self,
        content: &str,
        sender_type: SenderType,
    ) -> Result<Message, ConvoyError> {
        let session_id = self.ensure_session().await?;
        let request = SendMessageRequest {
            session_id,
            content: content.to_string(),
            sender_type,
            content_type: ContentType::Text,
        };
        let resp = self.api.send_message(&request).await?;
        debug!(message_id = resp.message.id.0, "message transmitted");
        Ok(resp.message)
    }

    /// Requests a transfer to a human operator.
    ///
    /// On success the local state transitions `bot_only -> handoff_requested`
    /// and a [`SessionEvent::HandoffRequested`] is emitted. On failure the
    /// error is reported and local state is left unchanged.
    pub async fn request_handoff(
        &self,
        trigger: HandoffTrigger,
        reason: Option<String>,
        priority: HandoffPriority,
    ) -> Result<HandoffAck, ConvoyError> {
        let current = self.current_status();
        if current.is_handoff_engaged() {
            return Err(ConvoyError::Internal(format!(
                "handoff already in progress (status {current})"
            )));
        }

        let session_id = self.ensure_session().await?;
        let request = RequestHandoffBody {
            session_id,
            trigger_type: trigger,
            reason,
            priority,
        };
        let ack = self.api.request_handoff(&request).await?;
        info!(handoff_id = ack.id, "handoff requested");

        self.apply_status(HandoffStatus::HandoffRequested).await?;
        self.emit(SessionEvent::HandoffRequested { id: ack.id });
        Ok(ack)
    }

    /// Called by the delivery coordinator whenever a fetched/pushed session
    /// snapshot carries a different handoff status than cached.
    ///
    /// Undefined transitions are rejected locally and logged; the
    /// authoritative status field is the only release signal.
    pub async fn observe_status(&self, snapshot: &SessionSnapshot) -> Result<(), ConvoyError> {
        if let Some(cached) = self.cached.load_full()
            && cached.session_id != snapshot.session_id
        {
            warn!(
                cached = %cached.session_id,
                observed = %snapshot.session_id,
                "ignoring snapshot for foreign session"
            );
            return Ok(());
        }
        self.apply_status(snapshot.handoff_status).await
    }

    /// Clears all local session state after the server reported the session
    /// gone (404 on poll). Returns the widget to un-sessioned `bot_only`.
    pub async fn invalidate(&self) -> Result<(), ConvoyError> {
        info!("session deleted server-side, clearing local state");
        self.state.reset().await?;
        self.cached.store(None);
        self.status_tx.send_replace(HandoffStatus::BotOnly);
        self.emit(SessionEvent::SessionInvalidated);
        Ok(())
    }

    /// Records the newest message timestamp the poller has observed.
    pub async fn record_last_seen(
        &self,
        sent_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), ConvoyError> {
        self.state
            .update(|s| {
                if s.last_seen_at.is_none_or(|seen| sent_at > seen) {
                    s.last_seen_at = Some(sent_at);
                }
            })
            .await?;
        Ok(())
    }

    /// The last-seen poll cursor, if any.
    pub async fn last_seen(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.state.snapshot().await.last_seen_at
    }

    async fn apply_status(&self, to: HandoffStatus) -> Result<(), ConvoyError> {
        let from = self.current_status();
        if from == to {
            return Ok(());
        }
        if !HandoffStatus::transition_allowed(from, to) {
            warn!(%from, %to, "rejecting undefined handoff transition");
            return Ok(());
        }

        self.state.update(|s| s.handoff_status = to).await?;
        if let Some(snap) = self.cached.load_full() {
            self.cached.store(Some(Arc::new(SessionSnapshot {
                session_id: snap.session_id.clone(),
                handoff_status: to,
            })));
        }
        self.status_tx.send_replace(to);
        info!(%from, %to, "handoff status changed");
        self.emit(SessionEvent::StatusChanged { from, to });
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        if self.events_tx.try_send(event).is_err() {
            debug!("session event channel full or closed, dropping event");
        }
    }
}
