// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Fanline crates.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::FanlineError;
use crate::media::MediaFuture;

/// Error string a freshly created subscription is suspended with until its
/// first resume. Forces the brand-new subscription through the normal resume
/// path (admin notification, driver start).
pub const NOT_STARTED: &str = "__notstarted";

/// Numeric identifier of a platform chat (group, channel, or private chat).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A chat reference as given by an operator: either a resolved numeric id
/// or a username that still needs platform-side resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRef {
    Id(ChatId),
    Username(String),
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRef::Id(id) => id.fmt(f),
            ChatRef::Username(name) => write!(f, "@{name}"),
        }
    }
}

/// Identifier of a platform message, returned by a successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i64);

/// Composite subscription key: `(source_tag, chat_id, item_id)` is globally
/// unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId {
    /// Stable tag of the source adapter (e.g. `2ch/thread`).
    pub source: String,
    /// Destination chat.
    pub chat_id: ChatId,
    /// Source-scoped item identifier (e.g. `b/12345`).
    pub item: String,
}

impl SubscriptionId {
    pub fn new(source: impl Into<String>, chat_id: ChatId, item: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            chat_id,
            item: item.into(),
        }
    }
}

/// Rendered as `source:chat_id:item`; the inverse of [`SubscriptionId::from_str`].
/// Used as callback-button payload, so source tags and item ids must not
/// contain `:`.
impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.chat_id, self.item)
    }
}

impl FromStr for SubscriptionId {
    type Err = FanlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(source), Some(chat), Some(item)) if !source.is_empty() && !item.is_empty() => {
                let chat_id = chat
                    .parse::<i64>()
                    .map_err(|_| FanlineError::Internal(format!("invalid chat id in '{s}'")))?;
                Ok(Self::new(source, ChatId(chat_id), item))
            }
            _ => Err(FanlineError::Internal(format!(
                "invalid subscription id '{s}'"
            ))),
        }
    }
}

/// Opaque bytes owned by a source adapter. Encodes the item parameters; the
/// core never interprets the contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawData(Vec<u8>);

impl RawData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Serialize a source-side item into raw data.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, FanlineError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| FanlineError::Internal(format!("raw data encode: {e}")))?;
        Ok(Self(bytes))
    }

    /// Deserialize the source-side item back out of raw data.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, FanlineError> {
        serde_json::from_slice(&self.0).map_err(|e| FanlineError::Source {
            message: format!("raw data decode: {e}"),
            source: None,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// The persistent unit: one external item delivered into one chat.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    /// Display label shown in listings and notifications.
    pub name: String,
    /// Source-owned item parameters.
    pub raw_data: RawData,
    /// Last delivered position; non-decreasing across commits.
    pub offset: i64,
    /// `None` means active; `Some(reason)` means suspended.
    pub error: Option<String>,
    /// Timestamp of the last commit, used only for round-robin fairness.
    pub updated_at: Option<String>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a successful [`Source::draft`](crate::traits::Source::draft):
/// the operator input was recognized and resolved into a concrete item.
#[derive(Debug, Clone)]
pub struct Draft {
    /// Source-scoped item identifier.
    pub item: String,
    /// Display label for the new subscription.
    pub name: String,
    /// Encoded item parameters, including the initial offset sentinel.
    pub raw_data: RawData,
}

/// One atomic unit of content to deliver: pre-formatted text pages plus
/// media futures. Exists only between production and a successful commit.
#[derive(Debug)]
pub struct Update {
    /// Offset to commit once the update is delivered.
    pub offset: i64,
    /// Item parameters to persist alongside the offset.
    pub raw_data: RawData,
    /// Ordered pages, each already within the platform size limit.
    pub text: Vec<String>,
    /// Media handles, resolved by the sender at delivery time.
    pub media: Vec<MediaFuture>,
}

/// An atomic state transition on a subscription.
#[derive(Debug, Clone)]
pub enum Change {
    /// Persist a delivered offset (and the raw data describing it).
    /// Precondition: subscription is active and `offset` does not decrease.
    Commit { raw_data: RawData, offset: i64 },
    /// Take the subscription out of rotation. Precondition: active.
    Suspend { reason: String },
    /// Put the subscription back into rotation. Precondition: suspended.
    Resume,
    /// Remove the subscription and all its state.
    Delete,
}

/// An inline button attached to a message; pressing it issues
/// `{command} {payload}` back through the command listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub command: String,
    pub payload: String,
}

impl InlineButton {
    pub fn new(
        label: impl Into<String>,
        command: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
            payload: payload.into(),
        }
    }
}

/// An inline keyboard: one button per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard(pub Vec<InlineButton>);

/// An operator command received from the platform, either a text command
/// or an inline-button press.
#[derive(Debug, Clone)]
pub struct Command {
    /// Issuing user. `0` is reserved for internal calls and never arrives
    /// from the platform.
    pub user_id: i64,
    /// Chat the command was issued in.
    pub chat_id: ChatId,
    /// Command name without arguments (e.g. `/sub`, `resume`).
    pub name: String,
    /// Everything after the command name.
    pub payload: String,
    /// Set when the command originates from an inline button; replies go
    /// through the callback-answer channel instead of a new message.
    pub callback_id: Option<String>,
}
