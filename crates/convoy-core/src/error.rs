// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Convoy delivery layer.

use thiserror::Error;

/// The primary error type used across all Convoy crates.
#[derive(Debug, Error)]
pub enum ConvoyError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persisted-state store errors (file I/O, serialization, corrupt state).
    #[error("state store error: {source}")]
    Store {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The Session API returned a non-success status.
    ///
    /// `retry_after_ms` carries the server's `Retry-After` hint when one was
    /// present (rate limiting, maintenance).
    #[error("api error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        retry_after_ms: Option<u64>,
    },

    /// The request never reached the server (DNS, connection refused, reset).
    #[error("network error: {message}")]
    Network {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Push transport errors (subscribe failure, dropped connection, bad frame).
    #[error("push channel error: {message}")]
    Push {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation exceeded its bounded timeout.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Session creation failed earlier this run; further attempts are suppressed.
    #[error("session unavailable: creation failed, widget degraded to bot-only")]
    SessionUnavailable,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConvoyError {
    /// HTTP status code carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ConvoyError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
