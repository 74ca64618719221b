// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single source of truth for "what blocking condition, if any, is shown".
//!
//! Only one presentation is visible at a time; a new trigger replaces the
//! current one only with equal-or-higher severity, or once the previous
//! condition's trigger has cleared. Rate-limit presentations self-clear
//! after their retry-after window, independent of user action.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::watch;
use tracing::{debug, info};

use convoy_core::taxonomy::{ClassifiedError, ErrorKind, Severity};

/// The closed set of fallback presentations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    /// Connectivity lost; input blocked, queueing offered.
    Offline,
    /// Maintenance window; blocking, auto-recovering.
    Maintenance,
    /// Too many requests; countdown, self-clearing.
    RateLimited,
    /// Credentials rejected; blocking, needs support.
    AuthInvalid,
    /// Plan quota exhausted; blocking, needs support.
    QuotaExceeded,
    /// Persistent server-side failure; manual retry offered.
    ServerError,
    /// Request exceeded its bound; manual retry offered.
    RequestTimeout,
    /// Reduced functionality, input stays enabled.
    Degraded,
}

/// Recovery actions a presentation can offer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    RetryNow,
    RetryAfterDelay,
    EnableOfflineMode,
    ContinueDegraded,
    ContactSupport,
}

/// The currently shown condition, as handed to the UI boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackPresentation {
    pub kind: FallbackKind,
    pub severity: Severity,
    /// Live countdown until the condition clears on its own, when known.
    #[serde(default)]
    pub countdown_ms: Option<u64>,
    pub actions: Vec<RecoveryAction>,
    pub blocks_input: bool,
}

impl FallbackPresentation {
    /// The canonical presentation for a kind.
    pub fn for_kind(kind: FallbackKind) -> Self {
        use FallbackKind::*;
        use RecoveryAction::*;
        let (severity, actions, blocks_input) = match kind {
            Offline => (Severity::High, vec![RetryNow, EnableOfflineMode], true),
            Maintenance => (Severity::Critical, vec![RetryAfterDelay], true),
            RateLimited => (Severity::Medium, vec![RetryAfterDelay], false),
            AuthInvalid => (Severity::High, vec![ContactSupport], true),
            QuotaExceeded => (Severity::Critical, vec![ContactSupport], true),
            ServerError => (Severity::High, vec![RetryNow, ContactSupport], false),
            RequestTimeout => (Severity::Medium, vec![RetryNow], false),
            Degraded => (Severity::Low, vec![ContinueDegraded], false),
        };
        Self {
            kind,
            severity,
            countdown_ms: None,
            actions,
            blocks_input,
        }
    }

    /// Same presentation with a countdown attached.
    pub fn with_countdown(mut self, countdown: Duration) -> Self {
        self.countdown_ms = Some(countdown.as_millis() as u64);
        self
    }
}

/// Maps a surfaced classified error to its presentation kind.
///
/// Only called for errors that actually surface (retry exhausted or
/// non-retryable); transient failures stay invisible while the retry engine
/// works through its budget.
pub fn presentation_for(classified: &ClassifiedError) -> FallbackPresentation {
    let kind = match classified.kind {
        ErrorKind::RateLimit => FallbackKind::RateLimited,
        ErrorKind::Maintenance => FallbackKind::Maintenance,
        ErrorKind::Authentication => FallbackKind::AuthInvalid,
        ErrorKind::QuotaExceeded => FallbackKind::QuotaExceeded,
        ErrorKind::Timeout => FallbackKind::RequestTimeout,
        ErrorKind::Network => FallbackKind::Offline,
        ErrorKind::Server | ErrorKind::Validation | ErrorKind::Unknown => {
            FallbackKind::ServerError
        }
    };
    let presentation = FallbackPresentation::for_kind(kind);
    match classified.retry_after() {
        Some(delay) => presentation.with_countdown(delay),
        None => presentation,
    }
}

/// Decides the single active fallback presentation.
pub struct FallbackStateController {
    active: Mutex<Option<FallbackPresentation>>,
    tx: watch::Sender<Option<FallbackPresentation>>,
    /// Bumped on every accepted presentation; stale self-clear timers
    /// compare against it before clearing.
    epoch: AtomicU64,
    /// Remaining offline-queue depth, reported by the flush loop.
    queue_depth: AtomicUsize,
}

impl FallbackStateController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            active: Mutex::new(None),
            tx,
            epoch: AtomicU64::new(0),
            queue_depth: AtomicUsize::new(0),
        }
    }

    /// Watch the active presentation; `None` means no blocking condition.
    pub fn subscribe(&self) -> watch::Receiver<Option<FallbackPresentation>> {
        self.tx.subscribe()
    }

    /// Currently active presentation, if any.
    pub fn active(&self) -> Option<FallbackPresentation> {
        self.active.lock().expect("fallback lock poisoned").clone()
    }

    /// True while the active presentation blocks input.
    pub fn input_blocked(&self) -> bool {
        self.active().map(|p| p.blocks_input).unwrap_or(false)
    }

    /// Remaining offline-queue depth as last reported.
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Records the remaining offline-queue depth (flush progress).
    pub fn on_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    /// Proposes a presentation. Applied only if no presentation is active or
    /// the new one has equal-or-higher severity. Returns whether it was shown.
    pub fn present(&self, presentation: FallbackPresentation) -> bool {
        let mut active = self.active.lock().expect("fallback lock poisoned");
        if let Some(current) = active.as_ref()
            && presentation.severity < current.severity
        {
            debug!(
                kind = %presentation.kind,
                blocked_by = %current.kind,
                "fallback presentation suppressed by higher severity"
            );
            return false;
        }
        info!(kind = %presentation.kind, severity = %presentation.severity, "fallback presentation shown");
        *active = Some(presentation.clone());
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.tx.send_replace(Some(presentation));
        true
    }

    /// Presents a rate-limited condition and schedules its self-clear after
    /// `delay`, independent of user action.
    pub fn present_rate_limited(self: &Arc<Self>, delay: Duration) {
        let presentation = FallbackPresentation::for_kind(FallbackKind::RateLimited)
            .with_countdown(delay);
        if !self.present(presentation) {
            return;
        }
        let epoch = self.epoch.load(Ordering::SeqCst);
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.clear_if_stale(FallbackKind::RateLimited, epoch);
        });
    }

    /// Clears the active presentation if its kind matches (its trigger
    /// resolved). Returns whether anything was cleared.
    pub fn clear(&self, kind: FallbackKind) -> bool {
        let mut active = self.active.lock().expect("fallback lock poisoned");
        if active.as_ref().map(|p| p.kind) == Some(kind) {
            info!(kind = %kind, "fallback presentation cleared");
            *active = None;
            self.tx.send_replace(None);
            true
        } else {
            false
        }
    }

    /// Clears whatever is active (manual recovery, widget reset).
    pub fn clear_all(&self) {
        let mut active = self.active.lock().expect("fallback lock poisoned");
        if active.take().is_some() {
            self.tx.send_replace(None);
        }
    }

    /// Timer-driven clear: only applies if no newer presentation replaced
    /// the one the timer was armed for.
    fn clear_if_stale(&self, kind: FallbackKind, armed_epoch: u64) {
        if self.epoch.load(Ordering::SeqCst) != armed_epoch {
            return;
        }
        self.clear(kind);
    }

    /// Routes a surfaced classified error to a presentation.
    pub fn on_surfaced_error(self: &Arc<Self>, classified: &ClassifiedError) {
        if classified.kind == ErrorKind::RateLimit {
            let delay = classified
                .retry_after()
                .unwrap_or(Duration::from_secs(60));
            self.present_rate_limited(delay);
        } else {
            self.present(presentation_for(classified));
        }
    }

    /// Connectivity transitions: lost shows the offline presentation,
    /// restored clears it.
    pub fn on_connectivity(&self, online: bool) {
        if online {
            self.clear(FallbackKind::Offline);
        } else {
            self.present(FallbackPresentation::for_kind(FallbackKind::Offline));
        }
    }
}

impl Default for FallbackStateController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_most_one_presentation_is_active() {
        let controller = FallbackStateController::new();
        assert!(controller.active().is_none());

        controller.present(FallbackPresentation::for_kind(FallbackKind::ServerError));
        controller.present(FallbackPresentation::for_kind(FallbackKind::Maintenance));

        let active = controller.active().unwrap();
        assert_eq!(active.kind, FallbackKind::Maintenance);
    }

    #[test]
    fn lower_severity_never_replaces_active_higher() {
        let controller = FallbackStateController::new();
        controller.present(FallbackPresentation::for_kind(FallbackKind::QuotaExceeded));

        let shown =
            controller.present(FallbackPresentation::for_kind(FallbackKind::RateLimited));
        assert!(!shown);
        assert_eq!(controller.active().unwrap().kind, FallbackKind::QuotaExceeded);
    }

    #[test]
    fn equal_severity_replaces() {
        let controller = FallbackStateController::new();
        controller.present(FallbackPresentation::for_kind(FallbackKind::ServerError));
        let shown = controller.present(FallbackPresentation::for_kind(FallbackKind::Offline));
        assert!(shown);
        assert_eq!(controller.active().unwrap().kind, FallbackKind::Offline);
    }

    #[test]
    fn cleared_condition_allows_lower_severity() {
        let controller = FallbackStateController::new();
        controller.present(FallbackPresentation::for_kind(FallbackKind::Maintenance));
        controller.clear(FallbackKind::Maintenance);

        let shown =
            controller.present(FallbackPresentation::for_kind(FallbackKind::RateLimited));
        assert!(shown);
    }

    #[test]
    fn clear_ignores_non_matching_kind() {
        let controller = FallbackStateController::new();
        controller.present(FallbackPresentation::for_kind(FallbackKind::Offline));
        assert!(!controller.clear(FallbackKind::RateLimited));
        assert!(controller.active().is_some());
    }

    #[test]
    fn blocking_set_matches_the_contract() {
        use FallbackKind::*;
        for kind in [Offline, Maintenance, AuthInvalid, QuotaExceeded] {
            assert!(FallbackPresentation::for_kind(kind).blocks_input, "{kind}");
        }
        for kind in [RateLimited, ServerError, RequestTimeout, Degraded] {
            assert!(!FallbackPresentation::for_kind(kind).blocks_input, "{kind}");
        }
    }

    #[test]
    fn connectivity_transitions_drive_offline_presentation() {
        let controller = FallbackStateController::new();
        controller.on_connectivity(false);
        assert_eq!(controller.active().unwrap().kind, FallbackKind::Offline);
        assert!(controller.input_blocked());

        controller.on_connectivity(true);
        assert!(controller.active().is_none());
        assert!(!controller.input_blocked());
    }

    #[test]
    fn watch_channel_tracks_active_presentation() {
        let controller = FallbackStateController::new();
        let rx = controller.subscribe();
        controller.present(FallbackPresentation::for_kind(FallbackKind::ServerError));
        assert_eq!(
            rx.borrow().as_ref().map(|p| p.kind),
            Some(FallbackKind::ServerError)
        );
        controller.clear(FallbackKind::ServerError);
        assert!(rx.borrow().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_self_clears_after_window() {
        let controller = Arc::new(FallbackStateController::new());
        controller.present_rate_limited(Duration::from_secs(30));

        let active = controller.active().unwrap();
        assert_eq!(active.kind, FallbackKind::RateLimited);
        assert_eq!(active.countdown_ms, Some(30_000));

        // Just before the window: still shown.
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(controller.active().is_some());

        // Past the window: cleared without user action.
        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(controller.active().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_rate_limit_timer_does_not_clear_newer_presentation() {
        let controller = Arc::new(FallbackStateController::new());
        controller.present_rate_limited(Duration::from_secs(10));
        // A higher-severity condition takes over before the timer fires.
        controller.present(FallbackPresentation::for_kind(FallbackKind::Maintenance));

        tokio::time::sleep(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;
        assert_eq!(controller.active().unwrap().kind, FallbackKind::Maintenance);
    }

    #[test]
    fn surfaced_errors_map_to_expected_kinds() {
        use convoy_core::taxonomy::{ClassifiedError, Severity};

        let cases = [
            (ErrorKind::Maintenance, FallbackKind::Maintenance),
            (ErrorKind::Authentication, FallbackKind::AuthInvalid),
            (ErrorKind::QuotaExceeded, FallbackKind::QuotaExceeded),
            (ErrorKind::Server, FallbackKind::ServerError),
            (ErrorKind::Timeout, FallbackKind::RequestTimeout),
            (ErrorKind::Network, FallbackKind::Offline),
            (ErrorKind::Unknown, FallbackKind::ServerError),
        ];
        for (kind, expected) in cases {
            let classified = ClassifiedError {
                kind,
                severity: Severity::High,
                retryable: false,
                status_code: None,
                retry_after_ms: None,
            };
            assert_eq!(presentation_for(&classified).kind, expected, "{kind}");
        }
    }

    #[test]
    fn queue_depth_reporting() {
        let controller = FallbackStateController::new();
        assert_eq!(controller.queue_depth(), 0);
        controller.on_queue_depth(3);
        assert_eq!(controller.queue_depth(), 3);
        controller.on_queue_depth(0);
        assert_eq!(controller.queue_depth(), 0);
    }
}
