// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source adapters for Fanline.
//!
//! Each adapter implements the core [`Source`](fanline_core::Source) trait:
//! recognize an operator input as an item (`draft`) and stream updates past
//! a stored offset (`pull`). Adding a source is a new module here plus a
//! registration in the binary; the engine never special-cases tags.

pub mod dvach;
pub mod reddit;
pub mod text;

pub use dvach::{DvachClient, ThreadSource};
pub use reddit::{RedditClient, RedditSource};
