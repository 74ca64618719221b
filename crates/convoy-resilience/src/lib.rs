// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for the Convoy widget delivery layer: error
//! classification, retry/backoff policy, and the fallback-state controller.

pub mod classifier;
pub mod fallback;
pub mod retry;

pub use classifier::classify;
pub use fallback::{
    FallbackKind, FallbackPresentation, FallbackStateController, RecoveryAction,
    presentation_for,
};
pub use retry::{RetryDecision, RetryLedger, RetryPolicy, RetryState};
