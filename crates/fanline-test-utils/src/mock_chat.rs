// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock platform client for deterministic testing.
//!
//! Captures outbound messages and albums for assertion, lets tests inject
//! operator commands and admin lists, and can fail or delay selected sends
//! to exercise the driver's failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fanline_core::{
    ChatClient, ChatId, ChatRef, Command, FanlineError, Keyboard, MediaRef, MessageId,
};
use tokio::sync::mpsc;

/// One captured `send_text` call.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

/// One captured `send_album` call.
#[derive(Debug, Clone)]
pub struct SentAlbum {
    pub chat_id: ChatId,
    pub media: Vec<MediaRef>,
}

pub struct MockChat {
    sent: Mutex<Vec<SentMessage>>,
    albums: Mutex<Vec<SentAlbum>>,
    callbacks: Mutex<Vec<(String, String)>>,
    admins: Mutex<HashMap<i64, Vec<i64>>>,
    usernames: Mutex<HashMap<String, i64>>,
    command_tx: mpsc::UnboundedSender<Command>,
    command_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Command>>,
    /// 1-based indices of `send_text` calls that fail.
    failing_sends: Mutex<HashSet<usize>>,
    /// One-shot substring triggers; the first matching send fails.
    failing_substrings: Mutex<Vec<String>>,
    send_delay: Mutex<Duration>,
    text_send_count: AtomicUsize,
}

impl MockChat {
    pub fn new() -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        Self {
            sent: Mutex::new(Vec::new()),
            albums: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Vec::new()),
            admins: Mutex::new(HashMap::new()),
            usernames: Mutex::new(HashMap::new()),
            command_tx,
            command_rx: tokio::sync::Mutex::new(command_rx),
            failing_sends: Mutex::new(HashSet::new()),
            failing_substrings: Mutex::new(Vec::new()),
            send_delay: Mutex::new(Duration::ZERO),
            text_send_count: AtomicUsize::new(0),
        }
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the n-th `send_text` call (1-based) fail with a transport error.
    pub fn fail_send(&self, n: usize) {
        Self::lock(&self.failing_sends).insert(n);
    }

    /// Make the next `send_text` whose text contains `needle` fail, once.
    pub fn fail_once_containing(&self, needle: &str) {
        Self::lock(&self.failing_substrings).push(needle.to_string());
    }

    /// Delay every send; used to race sends against concurrent changes.
    pub fn set_send_delay(&self, delay: Duration) {
        *Self::lock(&self.send_delay) = delay;
    }

    pub fn set_admins(&self, chat: ChatId, admins: Vec<i64>) {
        Self::lock(&self.admins).insert(chat.0, admins);
    }

    pub fn set_username(&self, name: &str, chat: ChatId) {
        Self::lock(&self.usernames).insert(name.to_string(), chat.0);
    }

    /// Feed a command into the listener as if an operator typed it.
    pub fn inject_command(&self, command: Command) {
        let _ = self.command_tx.send(command);
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        Self::lock(&self.sent).clone()
    }

    /// Texts sent to one chat, in order.
    pub fn texts_for(&self, chat: ChatId) -> Vec<String> {
        Self::lock(&self.sent)
            .iter()
            .filter(|m| m.chat_id == chat)
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn sent_albums(&self) -> Vec<SentAlbum> {
        Self::lock(&self.albums).clone()
    }

    pub fn callback_answers(&self) -> Vec<(String, String)> {
        Self::lock(&self.callbacks).clone()
    }
}

impl Default for MockChat {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatClient for MockChat {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageId, FanlineError> {
        let delay = *Self::lock(&self.send_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let n = self.text_send_count.fetch_add(1, Ordering::SeqCst) + 1;
        if Self::lock(&self.failing_sends).contains(&n) {
            return Err(FanlineError::Chat {
                message: format!("injected send failure #{n}"),
                source: None,
            });
        }
        {
            let mut triggers = Self::lock(&self.failing_substrings);
            if let Some(pos) = triggers.iter().position(|needle| text.contains(needle)) {
                let needle = triggers.remove(pos);
                return Err(FanlineError::Chat {
                    message: format!("injected send failure on '{needle}'"),
                    source: None,
                });
            }
        }
        Self::lock(&self.sent).push(SentMessage {
            chat_id: chat,
            text: text.to_string(),
            keyboard,
        });
        Ok(MessageId(n as i64))
    }

    async fn send_album(&self, chat: ChatId, media: &[MediaRef]) -> Result<(), FanlineError> {
        Self::lock(&self.albums).push(SentAlbum {
            chat_id: chat,
            media: media.to_vec(),
        });
        Ok(())
    }

    async fn resolve_chat(&self, chat: &ChatRef) -> Result<ChatId, FanlineError> {
        match chat {
            ChatRef::Id(id) => Ok(*id),
            ChatRef::Username(name) => Self::lock(&self.usernames)
                .get(name)
                .map(|id| ChatId(*id))
                .ok_or_else(|| FanlineError::Chat {
                    message: format!("unknown chat: @{name}"),
                    source: None,
                }),
        }
    }

    async fn chat_title(&self, chat: ChatId) -> Result<String, FanlineError> {
        Ok(format!("chat-{chat}"))
    }

    async fn get_admins(&self, chat: ChatId) -> Result<Vec<i64>, FanlineError> {
        Ok(Self::lock(&self.admins)
            .get(&chat.0)
            .cloned()
            .unwrap_or_default())
    }

    async fn receive_command(&self) -> Option<Command> {
        self.command_rx.lock().await.recv().await
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), FanlineError> {
        Self::lock(&self.callbacks).push((callback_id.to_string(), text.to_string()));
        Ok(())
    }
}
