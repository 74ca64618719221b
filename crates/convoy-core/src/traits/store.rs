// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence seam for the client-side durable state.
//!
//! The session id, handoff status, offline queue, and last-seen poll
//! timestamp survive widget reloads. Implementations live in
//! `convoy-session`; this trait exists so the rest of the workspace never
//! touches ambient storage directly.

use async_trait::async_trait;

use crate::error::ConvoyError;
use crate::types::PersistedState;

/// Durable storage for the widget's [`PersistedState`].
///
/// Read once at startup, written on every state change. No other process
/// shares the backing resource.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the persisted state, or `None` if nothing usable is stored.
    ///
    /// State written by an unknown schema version must be discarded (treated
    /// as `None`), not partially interpreted.
    async fn load(&self) -> Result<Option<PersistedState>, ConvoyError>;

    /// Persist the full state, replacing whatever was stored before.
    async fn save(&self, state: &PersistedState) -> Result<(), ConvoyError>;

    /// Remove the persisted state entirely (server-side session deletion).
    async fn clear(&self) -> Result<(), ConvoyError>;
}
