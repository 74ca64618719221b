// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Convoy widget delivery layer.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Convoy configuration.
///
/// Loaded from TOML files, with environment variable overrides. All sections
/// are optional and default to the reference values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConvoyConfig {
    /// Session API endpoint settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Identity of the embedding site and widget.
    #[serde(default)]
    pub session: SessionConfig,

    /// Inbound delivery settings (push subscription, poll fallback).
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Offline queue and connectivity probe settings.
    #[serde(default)]
    pub offline: OfflineConfig,

    /// Per-error-kind retry schedules.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Persisted client-state settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Analytics event emission settings.
    #[serde(default)]
    pub events: EventsConfig,
}

/// Analytics event emission configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    /// Whether to report widget analytics events (best-effort).
    #[serde(default = "default_events_enabled")]
    pub enabled: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: default_events_enabled(),
        }
    }
}

fn default_events_enabled() -> bool {
    true
}

/// Persisted client-state configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path of the versioned JSON state file (session id, handoff status,
    /// offline queue, last-seen poll timestamp).
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
        }
    }
}

fn default_state_path() -> String {
    "convoy-state.json".to_string()
}

/// Session API endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL of the Session API, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token for API authentication.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Timeout for ordinary requests (send, start, handoff), in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Shorter timeout for responsiveness-sensitive polls, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    45
}

fn default_poll_timeout_secs() -> u64 {
    15
}

/// Identity of the embedding site, sent when starting a conversation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Tenant owning the widget.
    #[serde(default)]
    pub tenant_id: u64,

    /// Widget configuration the session belongs to.
    #[serde(default)]
    pub widget_config_id: u64,

    /// Channel identifier reported to the server.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// User agent string of the embedding context.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Referrer URL of the embedding page.
    #[serde(default)]
    pub referrer_url: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tenant_id: 0,
            widget_config_id: 0,
            channel: default_channel(),
            user_agent: None,
            referrer_url: None,
        }
    }
}

fn default_channel() -> String {
    "widget".to_string()
}

/// Inbound delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// WebSocket endpoint of the push transport. Push is skipped when unset;
    /// polling remains the correctness backstop while handoff is active.
    #[serde(default)]
    pub push_url: Option<String>,

    /// Fixed poll cadence while handoff is engaged, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Bounded attempts to subscribe the push channel before giving up.
    #[serde(default = "default_subscribe_max_attempts")]
    pub subscribe_max_attempts: u32,

    /// Spacing between subscribe attempts, in seconds.
    #[serde(default = "default_subscribe_retry_secs")]
    pub subscribe_retry_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            push_url: None,
            poll_interval_secs: default_poll_interval_secs(),
            subscribe_max_attempts: default_subscribe_max_attempts(),
            subscribe_retry_secs: default_subscribe_retry_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_subscribe_max_attempts() -> u32 {
    5
}

fn default_subscribe_retry_secs() -> u64 {
    2
}

/// Offline queue and connectivity probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OfflineConfig {
    /// Cadence of the liveness probe against the health endpoint, in seconds.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Fixed delay between messages while flushing the queue, in seconds.
    #[serde(default = "default_flush_spacing_secs")]
    pub flush_spacing_secs: u64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: default_probe_interval_secs(),
            flush_spacing_secs: default_flush_spacing_secs(),
        }
    }
}

fn default_probe_interval_secs() -> u64 {
    30
}

fn default_flush_spacing_secs() -> u64 {
    1
}

/// One per-kind retry schedule: `delay(n) = base * multiplier^(n-1)`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySchedule {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl RetrySchedule {
    pub const fn new(max_attempts: u32, base_delay_ms: u64, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            backoff_multiplier,
        }
    }
}

/// Per-error-kind retry schedules.
///
/// Kinds without their own schedule (and without a server-provided delay)
/// use `fallback`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_network_schedule")]
    pub network: RetrySchedule,

    #[serde(default = "default_server_schedule")]
    pub server: RetrySchedule,

    #[serde(default = "default_timeout_schedule")]
    pub timeout: RetrySchedule,

    /// Rate limit: one attempt, delay comes from the server (else 60 s).
    #[serde(default = "default_rate_limit_schedule")]
    pub rate_limit: RetrySchedule,

    #[serde(default = "default_fallback_schedule")]
    pub fallback: RetrySchedule,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            network: default_network_schedule(),
            server: default_server_schedule(),
            timeout: default_timeout_schedule(),
            rate_limit: default_rate_limit_schedule(),
            fallback: default_fallback_schedule(),
        }
    }
}

fn default_network_schedule() -> RetrySchedule {
    RetrySchedule::new(3, 1_000, 2.0)
}

fn default_server_schedule() -> RetrySchedule {
    RetrySchedule::new(2, 2_000, 1.5)
}

fn default_timeout_schedule() -> RetrySchedule {
    RetrySchedule::new(2, 1_500, 2.0)
}

fn default_rate_limit_schedule() -> RetrySchedule {
    RetrySchedule::new(1, 60_000, 1.0)
}

fn default_fallback_schedule() -> RetrySchedule {
    RetrySchedule::new(1, 5_000, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_reference_values() {
        let config = ConvoyConfig::default();
        assert_eq!(config.api.request_timeout_secs, 45);
        assert_eq!(config.api.poll_timeout_secs, 15);
        assert_eq!(config.delivery.poll_interval_secs, 3);
        assert_eq!(config.delivery.subscribe_max_attempts, 5);
        assert_eq!(config.delivery.subscribe_retry_secs, 2);
        assert_eq!(config.offline.flush_spacing_secs, 1);
        assert_eq!(config.offline.probe_interval_secs, 30);
    }

    #[test]
    fn default_retry_schedules_match_reference_table() {
        let retry = RetryConfig::default();
        assert_eq!(retry.network, RetrySchedule::new(3, 1_000, 2.0));
        assert_eq!(retry.server, RetrySchedule::new(2, 2_000, 1.5));
        assert_eq!(retry.timeout, RetrySchedule::new(2, 1_500, 2.0));
        assert_eq!(retry.rate_limit, RetrySchedule::new(1, 60_000, 1.0));
        assert_eq!(retry.fallback, RetrySchedule::new(1, 5_000, 1.0));
    }

    #[test]
    fn session_defaults() {
        let session = SessionConfig::default();
        assert_eq!(session.channel, "widget");
        assert!(session.user_agent.is_none());
    }

    #[test]
    fn storage_defaults() {
        let storage = StorageConfig::default();
        assert_eq!(storage.state_path, "convoy-state.json");
    }
}
