// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock adapters and test harness for the Convoy widget delivery layer.

pub mod harness;
pub mod mock_push;

pub use harness::{
    TestHarness, TestHarnessBuilder, operator_message_json, poll_body, send_message_body,
    start_session_body,
};
pub use mock_push::MockPushChannel;
