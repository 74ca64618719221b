// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the conversation Session API.
//!
//! The Session API is the only path to the durable store of sessions,
//! messages, and handoff requests; everything in this crate is
//! request/response with bounded timeouts.

pub mod client;
pub mod types;

pub use client::{SessionApiClient, is_not_found};
pub use types::{
    ConversationUpdate, HandoffAck, RequestHandoffBody, SendMessageRequest,
    StartConversationRequest, WidgetEventBody,
};
