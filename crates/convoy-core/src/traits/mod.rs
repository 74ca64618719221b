// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits at the seams of the delivery layer.

pub mod push;
pub mod store;

pub use push::{PushChannel, PushEnvelope};
pub use store::SessionStore;
