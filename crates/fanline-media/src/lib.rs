// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media pipeline for Fanline: downloads source media and resolves it into
//! references the sender can attach to platform messages.

pub mod convert;
pub mod manager;

pub use convert::{ConvertError, Converter, SupportedFormats};
pub use manager::{MediaManager, MediaRequest};
