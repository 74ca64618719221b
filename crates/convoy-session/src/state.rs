// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted client state: stores and the shared state handle.
//!
//! The on-disk format is a single versioned JSON document. State written by
//! an unknown schema version is discarded on load rather than partially
//! interpreted.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use convoy_core::ConvoyError;
use convoy_core::traits::SessionStore;
use convoy_core::types::{PersistedState, STATE_VERSION};

/// File-backed [`SessionStore`] writing one JSON document.
///
/// Saves go through a temp file followed by a rename, so a crash mid-write
/// never leaves a truncated state file behind.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionStore for JsonStateStore {
    async fn load(&self) -> Result<Option<PersistedState>, ConvoyError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConvoyError::Store { source: e.into() }),
        };

        let state: PersistedState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding unreadable state file");
                return Ok(None);
            }
        };

        if state.version != STATE_VERSION {
            warn!(
                found = state.version,
                expected = STATE_VERSION,
                "discarding state written by unknown schema version"
            );
            return Ok(None);
        }

        debug!(path = %self.path.display(), "persisted state loaded");
        Ok(Some(state))
    }

    async fn save(&self, state: &PersistedState) -> Result<(), ConvoyError> {
        let raw = serde_json::to_string_pretty(state)
            .map_err(|e| ConvoyError::Store { source: e.into() })?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw.as_bytes())
            .await
            .map_err(|e| ConvoyError::Store { source: e.into() })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ConvoyError::Store { source: e.into() })?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), ConvoyError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConvoyError::Store { source: e.into() }),
        }
    }
}

/// In-memory [`SessionStore`] for tests and ephemeral embedders.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<Option<PersistedState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStateStore {
    async fn load(&self) -> Result<Option<PersistedState>, ConvoyError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, state: &PersistedState) -> Result<(), ConvoyError> {
        *self.inner.lock().await = Some(state.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ConvoyError> {
        *self.inner.lock().await = None;
        Ok(())
    }
}

/// Authoritative in-memory copy of the persisted state with write-through
/// to the backing store.
///
/// SessionManager and the offline queue both mutate the durable record;
/// funneling every mutation through `update()` keeps reads consistent and
/// serializes writes to the backend.
pub struct StateHandle {
    state: Mutex<PersistedState>,
    backend: Arc<dyn SessionStore>,
}

impl StateHandle {
    /// Loads the persisted state (or starts empty) and wraps it.
    pub async fn load(backend: Arc<dyn SessionStore>) -> Result<Self, ConvoyError> {
        let state = backend.load().await?.unwrap_or_default();
        Ok(Self {
            state: Mutex::new(state),
            backend,
        })
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> PersistedState {
        self.state.lock().await.clone()
    }

    /// Applies `mutate` and writes the result through to the backend.
    ///
    /// The lock is held across the save so writes cannot reorder.
    pub async fn update<F>(&self, mutate: F) -> Result<PersistedState, ConvoyError>
    where
        F: FnOnce(&mut PersistedState),
    {
        let mut guard = self.state.lock().await;
        mutate(&mut guard);
        guard.version = STATE_VERSION;
        let copy = guard.clone();
        self.backend.save(&copy).await?;
        Ok(copy)
    }

    /// Resets to an empty state and clears the backend (session invalidated).
    pub async fn reset(&self) -> Result<(), ConvoyError> {
        let mut guard = self.state.lock().await;
        *guard = PersistedState::empty();
        self.backend.clear().await
    }
}
