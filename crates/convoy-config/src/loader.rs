// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./convoy.toml` > `~/.config/convoy/convoy.toml`
//! > `/etc/convoy/convoy.toml` with environment variable overrides via the
//! `CONVOY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ConvoyConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/convoy/convoy.toml` (system-wide)
/// 3. `~/.config/convoy/convoy.toml` (user XDG config)
/// 4. `./convoy.toml` (local directory)
/// 5. `CONVOY_*` environment variables
pub fn load_config() -> Result<ConvoyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConvoyConfig::default()))
        .merge(Toml::file("/etc/convoy/convoy.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("convoy/convoy.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("convoy.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from an inline TOML string only (no XDG lookup).
///
/// Used for testing and embedder-supplied configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<ConvoyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConvoyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ConvoyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConvoyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CONVOY_API_BASE_URL` must map to
/// `api.base_url`, not `api.base.url`.
fn env_provider() -> Env {
    Env::prefixed("CONVOY_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: CONVOY_API_BASE_URL -> "api_base_url"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("api_", "api.", 1)
            .replacen("session_", "session.", 1)
            .replacen("delivery_", "delivery.", 1)
            .replacen("offline_", "offline.", 1)
            .replacen("retry_", "retry.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("events_", "events.", 1);
        mapped.into()
    })
}
