// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level runtime for the Convoy widget delivery layer.
//!
//! Convoy guarantees that messages produced by the automated agent, a human
//! operator, or the end user reach the visible conversation exactly once,
//! in order, despite unreliable networks, rate limiting, maintenance
//! windows, and an unreliable push transport. It also owns the state
//! machine tracking whether a conversation is served by the automated agent
//! or has been handed off to a human operator.

pub mod events;
pub mod runtime;

pub use events::EventTracker;
pub use runtime::{SendOutcome, WidgetRuntime, WidgetRuntimeBuilder};
