// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types and trait seams for the Fanline subscription aggregator.
//!
//! Fanline tracks content items on pluggable upstream sources and delivers
//! new items incrementally to chats of a messaging platform. This crate
//! holds the domain model ([`Subscription`], [`Update`], [`Change`]), the
//! error taxonomy, the producer/consumer [`pipe`] between a source pull and
//! the sender, media future handles, and the traits implemented by the
//! storage, source, and platform-client crates.

pub mod error;
pub mod media;
pub mod pipe;
pub mod traits;
pub mod types;

pub use error::FanlineError;
pub use media::{MediaFuture, MediaKind, MediaPayload, MediaPromise, MediaRef};
pub use pipe::{update_pipe, UpdateSink, UpdateStream, PIPE_CAPACITY};
pub use traits::{ChatClient, Source, SubscriptionStore};
pub use types::{
    Change, ChatId, ChatRef, Command, Draft, InlineButton, Keyboard, MessageId, RawData,
    Subscription, SubscriptionId, Update, NOT_STARTED,
};
