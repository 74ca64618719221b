// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline outgoing-message queue, connectivity monitoring, and the
//! reconnect flush loop.

pub mod connectivity;
pub mod flush;
pub mod queue;

pub use connectivity::ConnectivityMonitor;
pub use flush::FlushWorker;
pub use queue::OfflineQueue;
