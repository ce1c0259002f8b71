// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The engine aggregate: shared state, construction, and chat-driver
//! lifecycle.
//!
//! One driver task runs per active chat. Membership in `active_chats` is
//! the only shared mutable state, guarded by a reader-writer lock with
//! double-checked-lock insertion so concurrent `run_feed` calls spawn
//! exactly one driver.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use fanline_core::{ChatClient, ChatId, Source, SubscriptionStore};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub(crate) struct EngineInner {
    pub(crate) store: Arc<dyn SubscriptionStore>,
    pub(crate) chat: Arc<dyn ChatClient>,
    pub(crate) sources: Vec<Arc<dyn Source>>,
    pub(crate) aliases: HashMap<String, ChatId>,
    pub(crate) admin_id: i64,
    pub(crate) poll_interval: Duration,
    pub(crate) active_chats: RwLock<HashSet<ChatId>>,
    pub(crate) shutdown: CancellationToken,
}

/// The subscription scheduler and update pipeline. Cheap to clone; all
/// clones share the same state.
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<EngineInner>,
}

pub struct EngineBuilder {
    store: Arc<dyn SubscriptionStore>,
    chat: Arc<dyn ChatClient>,
    sources: Vec<Arc<dyn Source>>,
    aliases: HashMap<String, ChatId>,
    admin_id: i64,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl EngineBuilder {
    /// Register a source adapter. Sources are tried in registration order
    /// when drafting subscriptions.
    pub fn source(mut self, source: Arc<dyn Source>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn aliases(mut self, aliases: HashMap<String, ChatId>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn admin_id(mut self, admin_id: i64) -> Self {
        self.admin_id = admin_id;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Use an externally owned shutdown token so `/halt` and process
    /// signals share one cancellation edge.
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            inner: Arc::new(EngineInner {
                store: self.store,
                chat: self.chat,
                sources: self.sources,
                aliases: self.aliases,
                admin_id: self.admin_id,
                poll_interval: self.poll_interval,
                active_chats: RwLock::new(HashSet::new()),
                shutdown: self.shutdown,
            }),
        }
    }
}

impl Engine {
    pub fn builder(
        store: Arc<dyn SubscriptionStore>,
        chat: Arc<dyn ChatClient>,
    ) -> EngineBuilder {
        EngineBuilder {
            store,
            chat,
            sources: Vec::new(),
            aliases: HashMap::new(),
            admin_id: 0,
            poll_interval: Duration::from_secs(60),
            shutdown: CancellationToken::new(),
        }
    }

    /// Boot recovery: start one driver per chat that has at least one
    /// active subscription.
    pub async fn init(&self) -> Result<(), fanline_core::FanlineError> {
        for chat_id in self.inner.store.active_chats().await? {
            self.run_feed(chat_id);
        }
        Ok(())
    }

    /// Start the driver for a chat if it is not already running.
    /// Idempotent under concurrency: the double-checked write-lock insert
    /// guarantees exactly one driver per chat.
    pub fn run_feed(&self, chat_id: ChatId) {
        {
            let chats = self
                .inner
                .active_chats
                .read()
                .unwrap_or_else(|e| e.into_inner());
            if chats.contains(&chat_id) {
                return;
            }
        }
        {
            let mut chats = self
                .inner
                .active_chats
                .write()
                .unwrap_or_else(|e| e.into_inner());
            if !chats.insert(chat_id) {
                return;
            }
        }
        let engine = self.clone();
        tokio::spawn(async move { engine.run_driver(chat_id).await });
        info!(chat = %chat_id, "started chat driver");
    }

    pub(crate) fn remove_driver(&self, chat_id: ChatId) {
        self.inner
            .active_chats
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&chat_id);
    }

    /// Whether a driver is currently registered for the chat.
    pub fn is_chat_active(&self, chat_id: ChatId) -> bool {
        self.inner
            .active_chats
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&chat_id)
    }

    /// Number of chats with a running driver.
    pub fn active_chat_count(&self) -> usize {
        self.inner
            .active_chats
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub(crate) fn source(&self, tag: &str) -> Option<Arc<dyn Source>> {
        self.inner
            .sources
            .iter()
            .find(|s| s.id() == tag)
            .cloned()
    }

    /// Request graceful shutdown of all drivers and the command loop.
    pub fn halt(&self) {
        self.inner.shutdown.cancel();
    }

    /// The engine's shutdown token, shared with the process signal handler.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }
}
