// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Convoy widget delivery layer.
//!
//! This crate provides the foundational error type, domain types, the error
//! taxonomy, and the adapter traits used throughout the Convoy workspace.
//! It performs no I/O of its own.

pub mod error;
pub mod taxonomy;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ConvoyError;
pub use taxonomy::{ClassifiedError, ErrorKind, Severity};
pub use traits::{PushChannel, PushEnvelope, SessionStore};
pub use types::{
    HandoffStatus, Message, MessageId, PersistedState, SenderType, SessionId, SessionSnapshot,
};
