// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`SubscriptionStore`] with the same compare-and-set semantics
//! as the SQLite implementation, for deterministic engine tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use fanline_core::{
    Change, ChatId, FanlineError, Subscription, SubscriptionId, SubscriptionStore, NOT_STARTED,
};

#[derive(Clone)]
struct StoredSub {
    sub: Subscription,
    /// Monotonic stamp standing in for the `updated` timestamp; `None`
    /// until the first successful change.
    seq: Option<u64>,
    inserted: u64,
}

#[derive(Default)]
struct State {
    subs: HashMap<SubscriptionId, StoredSub>,
    next_seq: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored subscriptions, any state.
    pub fn len(&self) -> usize {
        self.lock().subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Minimal SQL-LIKE matcher: `%` matches any run of characters.
fn like_match(pattern: &str, value: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return pattern == value;
    }
    let mut rest = value;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(stripped) => rest = stripped,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn create(&self, sub: &Subscription) -> Result<bool, FanlineError> {
        let mut state = self.lock();
        if state.subs.contains_key(&sub.id) {
            return Ok(false);
        }
        let inserted = state.next_seq;
        state.next_seq += 1;
        let mut stored = sub.clone();
        stored.error = Some(NOT_STARTED.to_string());
        stored.updated_at = None;
        state.subs.insert(
            sub.id.clone(),
            StoredSub {
                sub: stored,
                seq: None,
                inserted,
            },
        );
        Ok(true)
    }

    async fn get(&self, id: &SubscriptionId) -> Result<Option<Subscription>, FanlineError> {
        Ok(self.lock().subs.get(id).map(|s| s.sub.clone()))
    }

    async fn advance(&self, chat_id: ChatId) -> Result<Option<Subscription>, FanlineError> {
        let state = self.lock();
        let picked = state
            .subs
            .values()
            .filter(|s| s.sub.id.chat_id == chat_id && s.sub.is_active())
            .min_by_key(|s| (s.seq.is_some(), s.seq.unwrap_or(0), s.inserted));
        Ok(picked.map(|s| s.sub.clone()))
    }

    async fn change(&self, id: &SubscriptionId, change: Change) -> Result<bool, FanlineError> {
        let mut guard = self.lock();
        let State { subs, next_seq } = &mut *guard;

        if matches!(change, Change::Delete) {
            return Ok(subs.remove(id).is_some());
        }

        let Some(stored) = subs.get_mut(id) else {
            return Ok(false);
        };

        let applied = match change {
            Change::Commit { raw_data, offset } => {
                if !stored.sub.is_active() || offset < stored.sub.offset {
                    false
                } else {
                    stored.sub.raw_data = raw_data;
                    stored.sub.offset = offset;
                    true
                }
            }
            Change::Suspend { reason } => {
                if stored.sub.is_active() {
                    stored.sub.error = Some(reason.chars().take(100).collect());
                    true
                } else {
                    false
                }
            }
            Change::Resume => {
                if stored.sub.is_active() {
                    false
                } else {
                    stored.sub.error = None;
                    true
                }
            }
            Change::Delete => unreachable!("handled above"),
        };

        if applied {
            let seq = *next_seq;
            *next_seq += 1;
            stored.seq = Some(seq);
            stored.sub.updated_at = Some(format!("seq-{seq:08}"));
        }
        Ok(applied)
    }

    async fn active_chats(&self) -> Result<Vec<ChatId>, FanlineError> {
        let state = self.lock();
        let mut chats: Vec<ChatId> = state
            .subs
            .values()
            .filter(|s| s.sub.is_active())
            .map(|s| s.sub.id.chat_id)
            .collect();
        chats.sort();
        chats.dedup();
        Ok(chats)
    }

    async fn list(
        &self,
        chat_id: ChatId,
        active: bool,
    ) -> Result<Vec<Subscription>, FanlineError> {
        let state = self.lock();
        let mut subs: Vec<&StoredSub> = state
            .subs
            .values()
            .filter(|s| s.sub.id.chat_id == chat_id && s.sub.is_active() == active)
            .collect();
        subs.sort_by_key(|s| s.inserted);
        Ok(subs.into_iter().map(|s| s.sub.clone()).collect())
    }

    async fn clear(&self, chat_id: ChatId, pattern: &str) -> Result<u64, FanlineError> {
        let mut state = self.lock();
        let doomed: Vec<SubscriptionId> = state
            .subs
            .values()
            .filter(|s| {
                s.sub.id.chat_id == chat_id
                    && s.sub
                        .error
                        .as_deref()
                        .is_some_and(|error| like_match(pattern, error))
            })
            .map(|s| s.sub.id.clone())
            .collect();
        for id in &doomed {
            state.subs.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanline_core::RawData;

    fn make_sub(chat: i64, item: &str) -> Subscription {
        Subscription {
            id: SubscriptionId::new("script", ChatId(chat), item),
            name: format!("#{item}"),
            raw_data: RawData::default(),
            offset: 0,
            error: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn mirrors_sqlite_create_semantics() {
        let store = MemoryStore::new();
        let sub = make_sub(1, "a");
        assert!(store.create(&sub).await.unwrap());
        assert!(!store.create(&sub).await.unwrap());
        let stored = store.get(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.error.as_deref(), Some(NOT_STARTED));
    }

    #[tokio::test]
    async fn rotation_is_fair() {
        let store = MemoryStore::new();
        for item in ["a", "b", "c"] {
            let sub = make_sub(1, item);
            store.create(&sub).await.unwrap();
            store.change(&sub.id, Change::Resume).await.unwrap();
        }
        let mut seen = Vec::new();
        for _ in 0..6 {
            let sub = store.advance(ChatId(1)).await.unwrap().unwrap();
            seen.push(sub.id.item.clone());
            store
                .change(
                    &sub.id,
                    Change::Commit {
                        raw_data: sub.raw_data.clone(),
                        offset: sub.offset,
                    },
                )
                .await
                .unwrap();
        }
        for item in ["a", "b", "c"] {
            assert_eq!(seen.iter().filter(|i| *i == item).count(), 2, "{seen:?}");
        }
    }

    #[tokio::test]
    async fn commit_monotonicity_enforced() {
        let store = MemoryStore::new();
        let sub = make_sub(1, "a");
        store.create(&sub).await.unwrap();
        store.change(&sub.id, Change::Resume).await.unwrap();
        let commit = |offset| Change::Commit {
            raw_data: RawData::default(),
            offset,
        };
        assert!(store.change(&sub.id, commit(5)).await.unwrap());
        assert!(!store.change(&sub.id, commit(4)).await.unwrap());
        assert!(store.change(&sub.id, commit(5)).await.unwrap());
    }

    #[test]
    fn like_matching() {
        assert!(like_match("%404%", "http 404 not found"));
        assert!(like_match("http%", "http 500"));
        assert!(like_match("%user", "suspended by user"));
        assert!(like_match("exact", "exact"));
        assert!(!like_match("%404%", "timeout"));
        assert!(!like_match("exact", "exactly"));
    }
}
