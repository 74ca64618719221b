// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connectivity signal: a periodic liveness probe against the health
//! endpoint, plus explicit nudges from failed sends and the user-chosen
//! offline mode.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use convoy_api::SessionApiClient;

/// Publishes the online/offline signal consumed by the send pipeline, the
/// flush worker, and the fallback controller.
pub struct ConnectivityMonitor {
    online_tx: watch::Sender<bool>,
    /// User explicitly chose offline mode after being warned; sends queue
    /// even while the network is up.
    offline_mode: AtomicBool,
}

impl ConnectivityMonitor {
    /// Starts optimistic: online until a probe or a send says otherwise.
    pub fn new() -> Self {
        let (online_tx, _) = watch::channel(true);
        Self {
            online_tx,
            offline_mode: AtomicBool::new(false),
        }
    }

    /// Watch the online/offline signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online_tx.subscribe()
    }

    pub fn is_online(&self) -> bool {
        *self.online_tx.borrow()
    }

    pub fn offline_mode(&self) -> bool {
        self.offline_mode.load(Ordering::Relaxed)
    }

    /// Whether outgoing user messages should be queued instead of sent.
    pub fn should_queue(&self) -> bool {
        !self.is_online() || self.offline_mode()
    }

    /// Connectivity-lost nudge (probe failure or network-classified send
    /// failure).
    pub fn mark_offline(&self) {
        if self.online_tx.send_if_modified(|online| {
            let changed = *online;
            *online = false;
            changed
        }) {
            info!("connectivity lost");
        }
    }

    /// Connectivity-restored nudge.
    pub fn mark_online(&self) {
        if self.online_tx.send_if_modified(|online| {
            let changed = !*online;
            *online = true;
            changed
        }) {
            info!("connectivity restored");
        }
    }

    /// Toggles the explicit offline mode. Disabling it wakes the flush
    /// worker so queued messages go out without waiting for a probe.
    pub fn set_offline_mode(&self, enabled: bool) {
        self.offline_mode.store(enabled, Ordering::Relaxed);
        info!(enabled, "offline mode toggled");
        // Notify watchers even though the online flag itself is unchanged.
        self.online_tx.send_modify(|_| {});
    }

    /// Periodic liveness probe loop against the health endpoint.
    pub async fn run_probe(
        self: Arc<Self>,
        api: Arc<SessionApiClient>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
            match api.probe_health().await {
                Ok(()) => self.mark_online(),
                Err(e) => {
                    debug!(error = %e, "health probe failed");
                    self.mark_offline();
                }
            }
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
