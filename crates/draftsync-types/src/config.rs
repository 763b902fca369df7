//! Configuration types for draftsync.
//!
//! `DraftSyncConfig` represents `config.toml` in the data directory. Every
//! field has a default, so an empty or partial file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::draft::DEFAULT_DRAFT_TTL_DAYS;

/// Smallest debounce window accepted from configuration.
pub const MIN_DEBOUNCE_MS: u64 = 100;

/// Smallest periodic save interval accepted from configuration.
pub const MIN_INTERVAL_MS: u64 = 1_000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftSyncConfig {
    #[serde(default)]
    pub autosave: AutoSaveConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Controller timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoSaveConfig {
    /// Trailing debounce window after the last edit.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Periodic safety save.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Transport timeout for remote draft requests.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// First delay after a rate-limited save; doubles on each consecutive one.
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,

    #[serde(default = "default_rate_limit_backoff_max_ms")]
    pub rate_limit_backoff_max_ms: u64,
}

fn default_debounce_ms() -> u64 {
    1_500
}

fn default_interval_ms() -> u64 {
    15_000
}

fn default_request_timeout_ms() -> u64 {
    8_000
}

fn default_rate_limit_backoff_ms() -> u64 {
    2_000
}

fn default_rate_limit_backoff_max_ms() -> u64 {
    60_000
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            interval_ms: default_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            rate_limit_backoff_max_ms: default_rate_limit_backoff_max_ms(),
        }
    }
}

impl AutoSaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.max(MIN_DEBOUNCE_MS))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(MIN_INTERVAL_MS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    pub fn rate_limit_backoff_max(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_max_ms.max(self.rate_limit_backoff_ms))
    }
}

/// REST server settings for `draftsync serve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Draft requests allowed per user per minute. 0 disables the limit.
    #[serde(default = "default_rate_limit_per_min")]
    pub rate_limit_per_min: u32,

    #[serde(default = "default_draft_ttl_days")]
    pub draft_ttl_days: i64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_rate_limit_per_min() -> u32 {
    10
}

fn default_draft_ttl_days() -> i64 {
    DEFAULT_DRAFT_TTL_DAYS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            rate_limit_per_min: default_rate_limit_per_min(),
            draft_ttl_days: default_draft_ttl_days(),
        }
    }
}

/// Remote endpoints used by `draftsync edit --server`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of a draftsync server (e.g. `http://127.0.0.1:3000`).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Post resource used by the publish step. Publishing is local-only when unset.
    #[serde(default)]
    pub posts_url: Option<String>,
}
