// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Fanline core: per-chat schedulers, the update pipeline, the
//! suspend/resume change engine, and the operator command router.
//!
//! Data flow: a driver picks the chat's least-recently-updated active
//! subscription, runs its source pull into a bounded pipe, sends each
//! update to the chat, and commits the new offset after the send succeeds.
//! Failures suspend only the affected subscription.

mod change;
mod commands;
mod engine;
mod scheduler;
mod sender;

pub use commands::SUSPENDED_BY_USER;
pub use engine::{Engine, EngineBuilder};
