// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation of Telegram updates into operator [`Command`]s.

use fanline_core::{ChatId, Command};
use teloxide::types::{CallbackQuery, Message};

/// Split a text command into name and payload. Returns `None` for plain
/// text. A `@botname` suffix on the command is dropped.
pub fn split_command(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }
    let (head, tail) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    let name = head.split('@').next().unwrap_or(head).to_string();
    Some((name, tail.trim().to_string()))
}

/// Build a command from an incoming message, if it is one. Messages
/// without a sender are dropped: user id 0 is reserved for internal calls.
pub fn command_from_message(msg: &Message) -> Option<Command> {
    let user = msg.from.as_ref()?;
    let (name, payload) = split_command(msg.text()?)?;
    Some(Command {
        user_id: user.id.0 as i64,
        chat_id: ChatId(msg.chat.id.0),
        name,
        payload,
        callback_id: None,
    })
}

/// Build a command from an inline-button press. The callback data is
/// `<command> <payload>` as attached by the keyboard builder.
pub fn command_from_callback(query: &CallbackQuery) -> Option<Command> {
    let data = query.data.as_ref()?;
    let (name, payload) = data.split_once(' ')?;
    let user_id = query.from.id.0 as i64;
    let chat_id = query
        .message
        .as_ref()
        .map(|m| ChatId(m.chat().id.0))
        .unwrap_or(ChatId(user_id));
    Some(Command {
        user_id,
        chat_id,
        name: name.to_string(),
        payload: payload.to_string(),
        callback_id: Some(query.id.clone()),
    })
}
