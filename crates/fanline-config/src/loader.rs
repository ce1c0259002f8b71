// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! The binary takes one explicit config path; on top of the file,
//! `FANLINE_*` environment variables override individual keys.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::FanlineConfig;

/// Load configuration from a specific file path with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. The given TOML file
/// 3. `FANLINE_*` environment variables
pub fn load_config_from_path(path: &Path) -> Result<FanlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FanlineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
///
/// Used for testing.
pub fn load_config_from_str(toml_content: &str) -> Result<FanlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FanlineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `FANLINE_TELEGRAM_BOT_TOKEN` must map to
/// `telegram.bot_token`, not `telegram.bot.token`.
fn env_provider() -> Env {
    Env::prefixed("FANLINE_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("log_", "log.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("telegram_", "telegram.", 1)
            .replacen("media_", "media.", 1)
            .replacen("dvach_", "dvach.", 1)
            .replacen("reddit_", "reddit.", 1);
        mapped.into()
    })
}
