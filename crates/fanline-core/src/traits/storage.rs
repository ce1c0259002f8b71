// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence contract for subscriptions.
//!
//! Every method must be safe under concurrent invocation from many chat
//! drivers; implementations serialize their own writes and never require
//! callers to hold locks.

use async_trait::async_trait;

use crate::error::FanlineError;
use crate::types::{Change, ChatId, Subscription, SubscriptionId};

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert a new subscription if its `(source, chat, item)` key is absent.
    ///
    /// The stored row starts suspended with the [`NOT_STARTED`](crate::types::NOT_STARTED)
    /// reason so the first resume transitions it to active. Returns `false`
    /// on key conflict.
    async fn create(&self, sub: &Subscription) -> Result<bool, FanlineError>;

    /// Fetch one subscription by key.
    async fn get(&self, id: &SubscriptionId) -> Result<Option<Subscription>, FanlineError>;

    /// Return one active subscription for the chat: the one with the
    /// smallest `updated_at`, never-committed rows first. Because every
    /// commit bumps `updated_at`, repeated calls visit every active
    /// subscription before revisiting any.
    async fn advance(&self, chat_id: ChatId) -> Result<Option<Subscription>, FanlineError>;

    /// Atomic compare-and-set state transition. Returns `false` when the
    /// precondition fails: the row is gone, its active/suspended state does
    /// not match the transition, or a commit would decrease the offset.
    async fn change(&self, id: &SubscriptionId, change: Change) -> Result<bool, FanlineError>;

    /// Distinct chats with at least one active subscription.
    async fn active_chats(&self) -> Result<Vec<ChatId>, FanlineError>;

    /// List the chat's subscriptions, active or suspended.
    async fn list(&self, chat_id: ChatId, active: bool) -> Result<Vec<Subscription>, FanlineError>;

    /// Delete suspended subscriptions of the chat whose error matches the
    /// SQL-LIKE pattern. Returns the number of rows removed.
    async fn clear(&self, chat_id: ChatId, pattern: &str) -> Result<u64, FanlineError>;
}
