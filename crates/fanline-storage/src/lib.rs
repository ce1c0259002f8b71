// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Fanline subscriptions.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`. All state
//! transitions are conditional single statements so concurrent chat
//! drivers compose without application-level locking.

pub mod database;
pub mod migrations;
pub mod store;

pub use database::Database;
pub use store::SqliteStore;
