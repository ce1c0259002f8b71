// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Fanline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so unrecognized config
//! keys are rejected at startup instead of being silently ignored.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Fanline configuration, loaded from a single TOML document.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FanlineConfig {
    /// Operator user id: the only user allowed to run `/halt` and see full
    /// `/status`. `0` disables operator-only commands.
    #[serde(default)]
    pub admin_id: i64,

    /// Username aliases resolved to chat ids at configuration time.
    #[serde(default)]
    pub aliases: HashMap<String, i64>,

    /// Seconds a chat driver sleeps between poll cycles.
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub dvach: DvachConfig,

    #[serde(default)]
    pub reddit: RedditConfig,
}

impl FanlineConfig {
    /// The poll interval as a [`Duration`].
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

impl Default for FanlineConfig {
    fn default() -> Self {
        Self {
            admin_id: 0,
            aliases: HashMap::new(),
            update_interval_secs: default_update_interval_secs(),
            log: LogConfig::default(),
            storage: StorageConfig::default(),
            telegram: TelegramConfig::default(),
            media: MediaConfig::default(),
            dvach: DvachConfig::default(),
            reddit: RedditConfig::default(),
        }
    }
}

fn default_update_interval_secs() -> u64 {
    60
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level filter (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Storage driver. Only `sqlite` is supported.
    #[serde(default = "default_storage_driver")]
    pub driver: String,

    /// Driver-specific datasource (the SQLite database path).
    #[serde(default = "default_datasource")]
    pub datasource: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: default_storage_driver(),
            datasource: default_datasource(),
        }
    }
}

fn default_storage_driver() -> String {
    "sqlite".to_string()
}

fn default_datasource() -> String {
    "fanline.db".to_string()
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token. Required to boot.
    #[serde(default)]
    pub bot_token: Option<String>,
}

/// Media pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    /// Number of concurrent download workers.
    #[serde(default = "default_media_concurrency")]
    pub concurrency: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            concurrency: default_media_concurrency(),
        }
    }
}

fn default_media_concurrency() -> usize {
    4
}

/// 2ch source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DvachConfig {
    #[serde(default = "default_dvach_base_url")]
    pub base_url: String,

    /// Optional usercode cookie for boards that require one.
    #[serde(default)]
    pub usercode: Option<String>,
}

impl Default for DvachConfig {
    fn default() -> Self {
        Self {
            base_url: default_dvach_base_url(),
            usercode: None,
        }
    }
}

fn default_dvach_base_url() -> String {
    "https://2ch.hk".to_string()
}

/// Reddit source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RedditConfig {
    #[serde(default = "default_reddit_base_url")]
    pub base_url: String,

    /// User agent sent with listing requests; Reddit throttles the default
    /// library agents aggressively.
    #[serde(default = "default_reddit_user_agent")]
    pub user_agent: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            base_url: default_reddit_base_url(),
            user_agent: default_reddit_user_agent(),
        }
    }
}

fn default_reddit_base_url() -> String {
    "https://www.reddit.com".to_string()
}

fn default_reddit_user_agent() -> String {
    "fanline/0.1".to_string()
}
