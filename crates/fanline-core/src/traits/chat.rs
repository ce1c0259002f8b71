// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging platform client contract.

use async_trait::async_trait;

use crate::error::FanlineError;
use crate::media::MediaRef;
use crate::types::{ChatId, ChatRef, Command, Keyboard, MessageId};

/// The engine's view of the messaging platform.
///
/// Implementations are internally thread-safe; rate limiting is their
/// concern, not the caller's.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send one text message, optionally with an inline keyboard.
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageId, FanlineError>;

    /// Send a group of resolved media items (at most the platform album
    /// limit) as one album; a single item is sent as a plain media message.
    async fn send_album(&self, chat: ChatId, media: &[MediaRef]) -> Result<(), FanlineError>;

    /// Resolve a chat reference (numeric id passes through; usernames are
    /// looked up on the platform).
    async fn resolve_chat(&self, chat: &ChatRef) -> Result<ChatId, FanlineError>;

    /// Human-readable chat title for notifications and listings.
    async fn chat_title(&self, chat: ChatId) -> Result<String, FanlineError>;

    /// User ids of the chat's administrators.
    async fn get_admins(&self, chat: ChatId) -> Result<Vec<i64>, FanlineError>;

    /// Receive the next operator command; `None` once the listener closed.
    async fn receive_command(&self) -> Option<Command>;

    /// Acknowledge an inline-button press with a short status text.
    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), FanlineError>;
}
