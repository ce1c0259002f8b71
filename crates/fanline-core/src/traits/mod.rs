// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the engine and its collaborators.

pub mod chat;
pub mod source;
pub mod storage;

pub use chat::ChatClient;
pub use source::Source;
pub use storage::SubscriptionStore;
