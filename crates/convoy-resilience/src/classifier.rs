// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure classification of failed operations into the error taxonomy.
//!
//! Classification precedence: explicit status code first, then
//! error-message pattern matching, else `unknown`.

use convoy_core::taxonomy::{ClassifiedError, ErrorKind, Severity};
use convoy_core::ConvoyError;

/// Default rate-limit delay when the server did not provide one.
const DEFAULT_RATE_LIMIT_MS: u64 = 60_000;

/// Maps a failed operation to its taxonomy entry.
pub fn classify(err: &ConvoyError) -> ClassifiedError {
    match err {
        ConvoyError::Api {
            status,
            retry_after_ms,
            ..
        } => classify_status(*status, *retry_after_ms),
        ConvoyError::Timeout { .. } => entry(ErrorKind::Timeout, None, None),
        ConvoyError::Network { .. } => entry(ErrorKind::Network, None, None),
        other => classify_message(&other.to_string()),
    }
}

/// Classification by explicit HTTP status code.
fn classify_status(status: u16, retry_after_ms: Option<u64>) -> ClassifiedError {
    let kind = match status {
        429 => ErrorKind::RateLimit,
        401 | 403 => ErrorKind::Authentication,
        402 => ErrorKind::QuotaExceeded,
        503 => ErrorKind::Maintenance,
        400 | 422 => ErrorKind::Validation,
        408 => ErrorKind::Timeout,
        s if s >= 500 => ErrorKind::Server,
        _ => ErrorKind::Unknown,
    };
    entry(kind, Some(status), retry_after_ms)
}

/// Fallback classification by message pattern.
fn classify_message(message: &str) -> ClassifiedError {
    let lower = message.to_lowercase();
    let kind = if lower.contains("rate limit") {
        ErrorKind::RateLimit
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ErrorKind::Timeout
    } else if lower.contains("quota") {
        ErrorKind::QuotaExceeded
    } else if lower.contains("maintenance") {
        ErrorKind::Maintenance
    } else if lower.contains("network") || lower.contains("connection") {
        ErrorKind::Network
    } else {
        ErrorKind::Unknown
    };
    entry(kind, None, None)
}

/// Builds the taxonomy entry for a kind: severity, retryability, and the
/// rate-limit delay default.
fn entry(kind: ErrorKind, status_code: Option<u16>, retry_after_ms: Option<u64>) -> ClassifiedError {
    let (severity, retryable) = match kind {
        ErrorKind::Network => (Severity::Medium, true),
        ErrorKind::Timeout => (Severity::Low, true),
        ErrorKind::RateLimit => (Severity::Medium, true),
        ErrorKind::Authentication => (Severity::High, false),
        ErrorKind::Server => (Severity::High, true),
        ErrorKind::QuotaExceeded => (Severity::Critical, false),
        ErrorKind::Maintenance => (Severity::Critical, true),
        ErrorKind::Validation => (Severity::Medium, false),
        ErrorKind::Unknown => (Severity::Medium, true),
    };

    let retry_after_ms = match kind {
        ErrorKind::RateLimit => Some(retry_after_ms.unwrap_or(DEFAULT_RATE_LIMIT_MS)),
        _ => retry_after_ms,
    };

    ClassifiedError {
        kind,
        severity,
        retryable,
        status_code,
        retry_after_ms,
    }
}
