// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator command routing.
//!
//! Translates platform commands into change-engine calls. Errors are
//! replied to the issuing user; state-changing commands go through the
//! access check inside [`Engine::change`].

use fanline_core::{
    Change, ChatId, ChatRef, Command, FanlineError, InlineButton, Keyboard, Subscription,
    SubscriptionId, NOT_STARTED,
};
use tracing::{debug, warn};

use crate::change::INTERNAL_USER;
use crate::engine::Engine;

/// Suspension reason recorded when an operator suspends manually.
pub const SUSPENDED_BY_USER: &str = "suspended by user";

impl Engine {
    /// Drain the platform command listener until shutdown.
    pub async fn run_commands(&self) {
        loop {
            let command = tokio::select! {
                _ = self.inner.shutdown.cancelled() => return,
                command = self.inner.chat.receive_command() => command,
            };
            let Some(command) = command else {
                debug!("command listener closed");
                return;
            };
            if let Err(e) = self.handle_command(&command).await {
                self.reply(&command, &e.to_string()).await;
            }
        }
    }

    /// Dispatch one command. Unknown commands are ignored.
    pub async fn handle_command(&self, command: &Command) -> Result<(), FanlineError> {
        match command.name.as_str() {
            "/sub" => self.cmd_subscribe(command).await,
            "suspend" => {
                self.cmd_change(
                    command,
                    Change::Suspend {
                        reason: SUSPENDED_BY_USER.to_string(),
                    },
                )
                .await
            }
            "resume" => self.cmd_change(command, Change::Resume).await,
            "delete" => self.cmd_change(command, Change::Delete).await,
            "/list" => self.cmd_list(command).await,
            "/clear" => self.cmd_clear(command).await,
            "/status" => self.cmd_status(command).await,
            "/halt" => self.cmd_halt(command).await,
            other => {
                debug!(command = %other, "ignoring unknown command");
                Ok(())
            }
        }
    }

    /// `/sub <link> [<chat>] [<options>]` - try every source's draft; the
    /// first one that recognizes the link wins.
    async fn cmd_subscribe(&self, command: &Command) -> Result<(), FanlineError> {
        let fields: Vec<&str> = command.payload.split_whitespace().collect();
        let Some(&link) = fields.first() else {
            return Err(FanlineError::Invalid(
                "usage: /sub <link> [<chat>] [<options>]".into(),
            ));
        };
        let chat_id = self.resolve_chat_arg(command, &fields, 1).await?;
        self.check_access(command.user_id, chat_id).await?;
        let options = fields.get(2).copied().unwrap_or("");

        for source in &self.inner.sources {
            let draft = match source.draft(link, options).await {
                Err(e) if e.is_draft_failed() => continue,
                Err(e) => return Err(e),
                Ok(draft) => draft,
            };

            let id = SubscriptionId::new(source.id(), chat_id, draft.item);
            let sub = Subscription {
                id: id.clone(),
                name: draft.name,
                raw_data: draft.raw_data,
                offset: 0,
                error: Some(NOT_STARTED.to_string()),
                updated_at: None,
            };
            if !self.inner.store.create(&sub).await? {
                return Err(FanlineError::Invalid("subscription already exists".into()));
            }
            // The first resume starts the feed and notifies the admins.
            self.change(INTERNAL_USER, &id, Change::Resume).await?;
            self.reply(command, "OK").await;
            return Ok(());
        }
        Err(FanlineError::DraftFailed)
    }

    /// `suspend|resume|delete <id>` - from a button press or typed out.
    async fn cmd_change(&self, command: &Command, change: Change) -> Result<(), FanlineError> {
        let id: SubscriptionId = command
            .payload
            .trim()
            .parse()
            .map_err(|_| FanlineError::Invalid("failed to parse subscription id".into()))?;
        self.change(command.user_id, &id, change).await?;
        self.reply(command, "OK").await;
        Ok(())
    }

    /// `/list [<chat>] [s]` - active subscriptions by default, suspended
    /// with `s`; replies to the issuing user with action buttons.
    async fn cmd_list(&self, command: &Command) -> Result<(), FanlineError> {
        let fields: Vec<&str> = command.payload.split_whitespace().collect();
        let chat_id = self.resolve_chat_arg(command, &fields, 0).await?;
        self.check_access(command.user_id, chat_id).await?;

        let (active, action) = match fields.get(1) {
            Some(&"s") => (false, "resume"),
            _ => (true, "suspend"),
        };
        let subs = self.inner.store.list(chat_id, active).await?;

        let title = match self.inner.chat.chat_title(chat_id).await {
            Ok(title) => title,
            Err(_) => chat_id.to_string(),
        };
        let text = format!(
            "Chat: {title}\n{} subscriptions eligible for {action}",
            subs.len()
        );
        let keyboard = Keyboard(
            subs.iter()
                .map(|sub| InlineButton::new(sub.name.clone(), action, sub.id.to_string()))
                .collect(),
        );
        self.inner
            .chat
            .send_text(ChatId(command.user_id), &text, Some(keyboard))
            .await?;
        Ok(())
    }

    /// `/clear <chat> <pattern>` - drop suspended subscriptions whose error
    /// matches the pattern.
    async fn cmd_clear(&self, command: &Command) -> Result<(), FanlineError> {
        let Some((chat_field, pattern)) = command.payload.split_once(' ') else {
            return Err(FanlineError::Invalid(
                "usage: /clear <chat> <pattern>".into(),
            ));
        };
        let fields = [chat_field];
        let chat_id = self.resolve_chat_arg(command, &fields, 0).await?;
        self.check_access(command.user_id, chat_id).await?;

        let cleared = self.inner.store.clear(chat_id, pattern.trim()).await?;
        self.reply(command, &format!("{cleared} subscriptions cleared"))
            .await;
        Ok(())
    }

    /// `/status` - liveness check; the configured admin also sees the
    /// driver count.
    async fn cmd_status(&self, command: &Command) -> Result<(), FanlineError> {
        let text = if self.inner.admin_id != 0 && command.user_id == self.inner.admin_id {
            format!("OK\nactive chat drivers: {}", self.active_chat_count())
        } else {
            "OK".to_string()
        };
        self.reply(command, &text).await;
        Ok(())
    }

    /// `/halt` - graceful shutdown, admin only.
    async fn cmd_halt(&self, command: &Command) -> Result<(), FanlineError> {
        if self.inner.admin_id == 0 || command.user_id != self.inner.admin_id {
            return Err(FanlineError::Forbidden);
        }
        self.reply(command, "halting").await;
        self.halt();
        Ok(())
    }

    /// Resolve an optional chat argument: missing or `.` means the issuing
    /// chat; otherwise an alias, a numeric id, or a platform username.
    pub(crate) async fn resolve_chat_arg(
        &self,
        command: &Command,
        fields: &[&str],
        idx: usize,
    ) -> Result<ChatId, FanlineError> {
        match fields.get(idx) {
            None | Some(&".") => Ok(command.chat_id),
            Some(&value) => {
                if let Some(id) = self.inner.aliases.get(value) {
                    return Ok(*id);
                }
                if let Ok(num) = value.parse::<i64>() {
                    return Ok(ChatId(num));
                }
                let name = value.trim_start_matches('@');
                self.inner
                    .chat
                    .resolve_chat(&ChatRef::Username(name.to_string()))
                    .await
            }
        }
    }

    /// Reply on the channel the command came in on: callback answer for
    /// button presses, a message otherwise. Failures are logged only.
    async fn reply(&self, command: &Command, text: &str) {
        let result = match &command.callback_id {
            Some(callback_id) => self.inner.chat.answer_callback(callback_id, text).await,
            None => self
                .inner
                .chat
                .send_text(command.chat_id, text, None)
                .await
                .map(|_| ()),
        };
        if let Err(e) = result {
            warn!(chat = %command.chat_id, error = %e, "failed to reply to command");
        }
    }
}
