// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram platform client for Fanline.
//!
//! Implements [`ChatClient`] via teloxide: HTML-mode sends with a
//! plain-text fallback, media albums, chat/admin lookup, and a
//! long-polling listener that turns messages and inline-button presses
//! into operator commands.

pub mod handler;

use async_trait::async_trait;
use fanline_config::model::TelegramConfig;
use fanline_core::{
    ChatClient, ChatId, ChatRef, Command, FanlineError, Keyboard, MediaKind, MediaPayload,
    MediaRef, MessageId,
};
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, ChatId as TgChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
    InputMedia, InputMediaDocument, InputMediaPhoto, InputMediaVideo, ParseMode, Recipient,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Telegram implementation of [`ChatClient`].
pub struct TelegramChat {
    bot: Bot,
    command_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Command>>,
    command_tx: mpsc::UnboundedSender<Command>,
    polling_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TelegramChat {
    /// Create the client. Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, FanlineError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            FanlineError::Config("telegram.bot_token is required".into())
        })?;
        if token.is_empty() {
            return Err(FanlineError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        let bot = Bot::new(token);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        Ok(Self {
            bot,
            command_rx: tokio::sync::Mutex::new(command_rx),
            command_tx,
            polling_handle: None,
        })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Start long polling; messages and button presses flow into
    /// `receive_command`. Idempotent.
    pub fn connect(&mut self) {
        if self.polling_handle.is_some() {
            return;
        }

        let bot = self.bot.clone();
        let message_tx = self.command_tx.clone();
        let callback_tx = self.command_tx.clone();

        info!("starting Telegram long polling");

        let handle = tokio::spawn(async move {
            let message_branch = Update::filter_message().endpoint(move |msg: Message| {
                let tx = message_tx.clone();
                async move {
                    match handler::command_from_message(&msg) {
                        Some(command) => {
                            if tx.send(command).is_err() {
                                warn!("command queue closed, dropping command");
                            }
                        }
                        None => debug!(chat_id = msg.chat.id.0, "ignoring non-command message"),
                    }
                    respond(())
                }
            });
            let callback_branch =
                Update::filter_callback_query().endpoint(move |query: CallbackQuery| {
                    let tx = callback_tx.clone();
                    async move {
                        if let Some(command) = handler::command_from_callback(&query) {
                            let _ = tx.send(command);
                        }
                        respond(())
                    }
                });

            Dispatcher::builder(
                bot,
                teloxide::dptree::entry()
                    .branch(message_branch)
                    .branch(callback_branch),
            )
            .default_handler(|_| async {}) // Silently ignore other update kinds
            .build()
            .dispatch()
            .await;
        });

        self.polling_handle = Some(handle);
    }

    fn recipient(chat: ChatId) -> Recipient {
        Recipient::Id(TgChatId(chat.0))
    }
}

fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.0.iter().map(|button| {
        vec![InlineKeyboardButton::callback(
            button.label.clone(),
            format!("{} {}", button.command, button.payload),
        )]
    }))
}

fn input_file(payload: &MediaPayload) -> Result<InputFile, FanlineError> {
    match payload {
        MediaPayload::Url(raw) => {
            let parsed = url::Url::parse(raw)
                .map_err(|e| FanlineError::Media(format!("invalid media url {raw}: {e}")))?;
            Ok(InputFile::url(parsed))
        }
        MediaPayload::Bytes { data, filename } => {
            Ok(InputFile::memory(data.clone()).file_name(filename.clone()))
        }
    }
}

fn input_media(media: &MediaRef) -> Result<InputMedia, FanlineError> {
    let file = input_file(&media.payload)?;
    Ok(match media.kind {
        MediaKind::Photo => InputMedia::Photo(InputMediaPhoto::new(file)),
        MediaKind::Video => InputMedia::Video(InputMediaVideo::new(file)),
        MediaKind::Document => InputMedia::Document(InputMediaDocument::new(file)),
    })
}

#[async_trait]
impl ChatClient for TelegramChat {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageId, FanlineError> {
        let recipient = Self::recipient(chat);
        let mut request = self
            .bot
            .send_message(recipient.clone(), text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = &keyboard {
            request = request.reply_markup(markup(keyboard));
        }

        match request.await {
            Ok(sent) => Ok(MessageId(i64::from(sent.id.0))),
            Err(e) if e.to_string().contains("can't parse entities") => {
                // Upstream HTML slipped past sanitizing; deliver as plain
                // text rather than losing the update.
                warn!(chat = chat.0, error = %e, "HTML parse failed, sending as plain text");
                let mut retry = self.bot.send_message(recipient, text);
                if let Some(keyboard) = &keyboard {
                    retry = retry.reply_markup(markup(keyboard));
                }
                retry
                    .await
                    .map(|sent| MessageId(i64::from(sent.id.0)))
                    .map_err(|e| FanlineError::chat_with("failed to send message", e))
            }
            Err(e) => Err(FanlineError::chat_with("failed to send message", e)),
        }
    }

    async fn send_album(&self, chat: ChatId, media: &[MediaRef]) -> Result<(), FanlineError> {
        match media {
            [] => Ok(()),
            [single] => {
                let file = input_file(&single.payload)?;
                let recipient = Self::recipient(chat);
                let result = match single.kind {
                    MediaKind::Photo => self.bot.send_photo(recipient, file).await,
                    MediaKind::Video => self.bot.send_video(recipient, file).await,
                    MediaKind::Document => self.bot.send_document(recipient, file).await,
                };
                result
                    .map(|_| ())
                    .map_err(|e| FanlineError::chat_with("failed to send media", e))
            }
            group => {
                let album = group
                    .iter()
                    .map(input_media)
                    .collect::<Result<Vec<_>, _>>()?;
                self.bot
                    .send_media_group(Self::recipient(chat), album)
                    .await
                    .map(|_| ())
                    .map_err(|e| FanlineError::chat_with("failed to send media group", e))
            }
        }
    }

    async fn resolve_chat(&self, chat: &ChatRef) -> Result<ChatId, FanlineError> {
        match chat {
            ChatRef::Id(id) => Ok(*id),
            ChatRef::Username(name) => {
                let chat = self
                    .bot
                    .get_chat(Recipient::ChannelUsername(format!("@{name}")))
                    .await
                    .map_err(|e| {
                        FanlineError::chat_with(format!("failed to resolve @{name}"), e)
                    })?;
                Ok(ChatId(chat.id.0))
            }
        }
    }

    async fn chat_title(&self, chat: ChatId) -> Result<String, FanlineError> {
        let chat = self
            .bot
            .get_chat(Self::recipient(chat))
            .await
            .map_err(|e| FanlineError::chat_with("failed to get chat", e))?;
        Ok(chat
            .title()
            .map(str::to_string)
            .or_else(|| chat.username().map(|u| format!("@{u}")))
            .unwrap_or_else(|| chat.id.0.to_string()))
    }

    async fn get_admins(&self, chat: ChatId) -> Result<Vec<i64>, FanlineError> {
        let members = self
            .bot
            .get_chat_administrators(Self::recipient(chat))
            .await
            .map_err(|e| FanlineError::chat_with("failed to get chat admins", e))?;
        Ok(members
            .into_iter()
            .map(|member| member.user.id.0 as i64)
            .collect())
    }

    async fn receive_command(&self) -> Option<Command> {
        self.command_rx.lock().await.recv().await
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), FanlineError> {
        self.bot
            .answer_callback_query(callback_id.to_string())
            .text(text)
            .await
            .map(|_| ())
            .map_err(|e| FanlineError::chat_with("failed to answer callback", e))
    }
}
