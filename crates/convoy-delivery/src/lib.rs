// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dual-channel inbound delivery for the Convoy widget delivery layer.
//!
//! A push subscription is the primary path; a fixed-cadence poll loop is
//! the correctness backstop while a handoff is outstanding. Both feed one
//! deduplicating consumer that forwards each message id to the UI boundary
//! exactly once.

pub mod coordinator;
pub mod push_ws;

pub use coordinator::{DeliveryCoordinator, DeliveryHandle, DeliverySource, event_names};
pub use push_ws::WsPushChannel;
