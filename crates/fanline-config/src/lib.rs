// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model and loader for Fanline.

pub mod loader;
pub mod model;

pub use loader::{load_config_from_path, load_config_from_str};
pub use model::FanlineConfig;
