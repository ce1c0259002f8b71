// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The change engine: access-checked state transitions with admin
//! notifications.
//!
//! Offset commits are silent; suspend/resume notify the chat's admins with
//! an inline button offering the inverse operation. Notification delivery
//! is fire-and-forget and never rolls back the state change.

use fanline_core::{Change, ChatId, FanlineError, InlineButton, Keyboard, SubscriptionId};
use tracing::{debug, info, warn};

use crate::engine::Engine;

/// User id of internal callers; bypasses the access check.
pub(crate) const INTERNAL_USER: i64 = 0;

impl Engine {
    /// Apply one state transition on behalf of `user_id`.
    ///
    /// Returns [`FanlineError::NotFound`] when the storage compare-and-set
    /// fails: the subscription is gone or its state did not match.
    pub async fn change(
        &self,
        user_id: i64,
        id: &SubscriptionId,
        change: Change,
    ) -> Result<(), FanlineError> {
        self.check_access(user_id, id.chat_id).await?;

        let applied = self.inner.store.change(id, change.clone()).await?;
        if !applied {
            return Err(FanlineError::NotFound);
        }

        match change {
            Change::Commit { offset, .. } => {
                debug!(id = %id, offset, "offset committed");
            }
            Change::Delete => {
                info!(id = %id, "subscription deleted");
            }
            Change::Resume => {
                info!(id = %id, "subscription resumed");
                self.run_feed(id.chat_id);
                self.spawn_status_notification(id.clone(), None);
            }
            Change::Suspend { reason } => {
                info!(id = %id, reason = %reason, "subscription suspended");
                self.spawn_status_notification(id.clone(), Some(reason));
            }
        }
        Ok(())
    }

    /// Internal callers pass; otherwise the user must be the chat itself
    /// (private chat) or one of its admins.
    pub(crate) async fn check_access(
        &self,
        user_id: i64,
        chat_id: ChatId,
    ) -> Result<(), FanlineError> {
        if user_id == INTERNAL_USER || user_id == chat_id.0 {
            return Ok(());
        }
        let admins = self.inner.chat.get_admins(chat_id).await?;
        if admins.contains(&user_id) {
            Ok(())
        } else {
            Err(FanlineError::Forbidden)
        }
    }

    fn spawn_status_notification(&self, id: SubscriptionId, reason: Option<String>) {
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.send_status_notification(&id, reason.as_deref()).await {
                warn!(id = %id, error = %e, "status notification failed");
            }
        });
    }

    async fn send_status_notification(
        &self,
        id: &SubscriptionId,
        reason: Option<&str>,
    ) -> Result<(), FanlineError> {
        let sub = self
            .inner
            .store
            .get(id)
            .await?
            .ok_or(FanlineError::NotFound)?;

        let title = match self.inner.chat.chat_title(id.chat_id).await {
            Ok(title) => title,
            Err(_) => id.chat_id.to_string(),
        };
        let status = match reason {
            None => "OK".to_string(),
            Some(reason) => format!("suspended: {reason}"),
        };
        let text = format!(
            "Subscription {status}\nChat: {title}\nSource: {}\nItem: {}",
            id.source, sub.name
        );
        // Offer the inverse operation.
        let keyboard = match reason {
            None => Keyboard(vec![InlineButton::new("Suspend", "suspend", id.to_string())]),
            Some(_) => Keyboard(vec![
                InlineButton::new("Resume", "resume", id.to_string()),
                InlineButton::new("Delete", "delete", id.to_string()),
            ]),
        };

        for admin in self.notification_targets(id.chat_id).await {
            if let Err(e) = self
                .inner
                .chat
                .send_text(ChatId(admin), &text, Some(keyboard.clone()))
                .await
            {
                warn!(admin, error = %e, "failed to notify admin");
            }
        }
        Ok(())
    }

    /// Admins of the chat; a private chat has none, so the chat itself is
    /// notified.
    async fn notification_targets(&self, chat_id: ChatId) -> Vec<i64> {
        match self.inner.chat.get_admins(chat_id).await {
            Ok(admins) if !admins.is_empty() => admins,
            _ => vec![chat_id.0],
        }
    }
}
