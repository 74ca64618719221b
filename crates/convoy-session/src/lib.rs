// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation/handoff state machine and persisted client state.

pub mod manager;
pub mod state;

pub use manager::{SessionEvent, SessionManager};
pub use state::{JsonStateStore, MemoryStateStore, StateHandle};
