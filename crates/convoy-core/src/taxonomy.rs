// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The error taxonomy surfaced to the UI boundary and to analytics.
//!
//! A failed operation is mapped by the classifier to exactly one
//! [`ErrorKind`]; the kind decides retryability and the fallback
//! presentation. Severity is ordered so the fallback controller can compare
//! presentations for preemption.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};

/// Closed set of failure classes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request never reached the server.
    Network,
    /// Bounded timeout exceeded.
    Timeout,
    /// 429-equivalent; carries a server retry-after delay.
    RateLimit,
    /// 401/403; not retryable.
    Authentication,
    /// 5xx; retryable.
    Server,
    /// Plan quota exhausted; not retryable, critical.
    QuotaExceeded,
    /// Maintenance window; retryable, critical.
    Maintenance,
    /// 400/422 input rejection; not retryable.
    Validation,
    /// Anything else; retryable once.
    Unknown,
}

/// How disruptive a classified error is, ordered for preemption.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Auto-retry, no user interruption.
    Low,
    /// Auto-retry with a visible countdown.
    Medium,
    /// Retry exhausted or non-retryable; manual retry offered.
    High,
    /// Blocking condition (quota, maintenance); session otherwise intact.
    Critical,
}

/// A classified failure: the contract handed to the retry engine, the
/// fallback controller, the UI boundary, and analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub retryable: bool,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub retry_after_ms: Option<u64>,
}

impl ClassifiedError {
    /// Server-suggested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_ms.map(Duration::from_millis)
    }
}
