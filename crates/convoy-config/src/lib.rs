// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered TOML configuration for the Convoy widget delivery layer.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    ApiConfig, ConvoyConfig, DeliveryConfig, EventsConfig, OfflineConfig, RetryConfig,
    RetrySchedule, SessionConfig, StorageConfig,
};
