// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles for the Fanline engine: an in-memory subscription store, a
//! capturing mock platform client, and a scripted source adapter.

pub mod memory_store;
pub mod mock_chat;
pub mod script_source;

pub use memory_store::MemoryStore;
pub use mock_chat::{MockChat, SentAlbum, SentMessage};
pub use script_source::{PullScript, ScriptSource};
