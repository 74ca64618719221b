// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policy engine: per-kind backoff schedules and per-operation
//! attempt state.
//!
//! Attempt counters are scoped per logical operation identity (e.g. one key
//! per outgoing message), not global, so unrelated operations do not share
//! backoff budgets.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use convoy_config::{RetryConfig, RetrySchedule};
use convoy_core::taxonomy::{ClassifiedError, ErrorKind};

/// What the caller should do after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry automatically after the given delay.
    RetryAfter(Duration),
    /// Do not retry automatically; new attempts are blocked until the delay
    /// elapses (rate limiting). The condition clears on its own.
    Blocked(Duration),
    /// The error kind is never auto-retried; surface it immediately.
    NotRetryable,
    /// The attempt budget for this operation is spent; surface a terminal
    /// error instead of retrying.
    Exhausted,
}

/// Per-operation retry bookkeeping.
#[derive(Debug, Clone)]
pub struct RetryState {
    pub kind: ErrorKind,
    pub attempts: u32,
    pub next_allowed_at: Option<Instant>,
}

/// Computes whether to retry and after what delay, from per-kind schedules.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    fn schedule_for(&self, kind: ErrorKind) -> &RetrySchedule {
        match kind {
            ErrorKind::Network => &self.config.network,
            ErrorKind::Server => &self.config.server,
            ErrorKind::Timeout => &self.config.timeout,
            ErrorKind::RateLimit => &self.config.rate_limit,
            _ => &self.config.fallback,
        }
    }

    /// Delay before attempt number `attempt` (1-based), or `None` once the
    /// kind's attempt budget is exceeded.
    ///
    /// `delay(n) = base * multiplier^(n-1)`, so delays never shrink as the
    /// attempt number grows (multipliers are >= 1).
    pub fn next_delay(&self, kind: ErrorKind, attempt: u32) -> Option<Duration> {
        let schedule = self.schedule_for(kind);
        if attempt == 0 || attempt > schedule.max_attempts {
            return None;
        }
        let factor = schedule.backoff_multiplier.powi(attempt as i32 - 1);
        let delay_ms = (schedule.base_delay_ms as f64 * factor).round() as u64;
        Some(Duration::from_millis(delay_ms))
    }

    /// Maximum attempts allowed for the kind.
    pub fn max_attempts(&self, kind: ErrorKind) -> u32 {
        self.schedule_for(kind).max_attempts
    }

    fn schedule_for_rate_limit(&self) -> u64 {
        self.config.rate_limit.base_delay_ms
    }
}

/// Tracks [`RetryState`] per logical operation and turns classified
/// failures into [`RetryDecision`]s.
#[derive(Debug)]
pub struct RetryLedger {
    policy: RetryPolicy,
    states: HashMap<String, RetryState>,
}

impl RetryLedger {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            states: HashMap::new(),
        }
    }

    /// Records a failure of `op` and decides the next step.
    pub fn on_failure(&mut self, op: &str, classified: &ClassifiedError) -> RetryDecision {
        if !classified.retryable {
            self.states.remove(op);
            return RetryDecision::NotRetryable;
        }

        if classified.kind == ErrorKind::RateLimit {
            // Never retried immediately; new sends are blocked until the
            // server-specified window elapses, then the condition self-clears.
            let delay = classified
                .retry_after()
                .unwrap_or_else(|| Duration::from_millis(self.policy.schedule_for_rate_limit()));
            self.states.remove(op);
            return RetryDecision::Blocked(delay);
        }

        let state = self
            .states
            .entry(op.to_string())
            .or_insert_with(|| RetryState {
                kind: classified.kind,
                attempts: 0,
                next_allowed_at: None,
            });

        // A different kind failing for the same operation restarts the count;
        // the budgets are per kind.
        if state.kind != classified.kind {
            state.kind = classified.kind;
            state.attempts = 0;
        }

        state.attempts += 1;
        match self.policy.next_delay(classified.kind, state.attempts) {
            Some(delay) => {
                state.next_allowed_at = Some(Instant::now() + delay);
                debug!(
                    op,
                    kind = %classified.kind,
                    attempt = state.attempts,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling retry"
                );
                RetryDecision::RetryAfter(delay)
            }
            None => {
                debug!(op, kind = %classified.kind, "retry budget exhausted");
                self.states.remove(op);
                RetryDecision::Exhausted
            }
        }
    }

    /// Clears the state for `op` after a successful attempt.
    pub fn on_success(&mut self, op: &str) {
        self.states.remove(op);
    }

    /// Clears all attempt counters (manual "retry now").
    pub fn reset(&mut self) {
        self.states.clear();
    }

    /// Current retry state for an operation, if any.
    pub fn state(&self, op: &str) -> Option<&RetryState> {
        self.states.get(op)
    }
}
