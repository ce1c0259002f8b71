// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`SubscriptionStore`] contract.
//!
//! Every state transition is a single conditional UPDATE/DELETE; the
//! affected-row count is the compare-and-set result. Timestamps are written
//! by SQLite itself so ordering does not depend on process clocks.

use async_trait::async_trait;
use fanline_core::{
    Change, ChatId, FanlineError, RawData, Subscription, SubscriptionId, SubscriptionStore,
    NOT_STARTED,
};
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};

/// Suspension reasons are capped to fit the error column.
const MAX_ERROR_LEN: usize = 100;

const SELECT_COLUMNS: &str =
    "item_id, chat_id, source, name, item, last_offset, error, updated";

pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open the store at the given SQLite path.
    pub async fn open(path: &str) -> Result<Self, FanlineError> {
        Ok(Self {
            db: Database::open(path).await?,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn close(self) -> Result<(), FanlineError> {
        self.db.close().await
    }
}

fn row_to_subscription(row: &Row<'_>) -> Result<Subscription, rusqlite::Error> {
    Ok(Subscription {
        id: SubscriptionId {
            item: row.get(0)?,
            chat_id: ChatId(row.get(1)?),
            source: row.get(2)?,
        },
        name: row.get(3)?,
        raw_data: RawData::new(row.get::<_, Vec<u8>>(4)?),
        offset: row.get(5)?,
        error: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[async_trait]
impl SubscriptionStore for SqliteStore {
    async fn create(&self, sub: &Subscription) -> Result<bool, FanlineError> {
        let item_id = sub.id.item.clone();
        let chat_id = sub.id.chat_id.0;
        let source = sub.id.source.clone();
        let name = sub.name.clone();
        let item = sub.raw_data.as_bytes().to_vec();
        let offset = sub.offset;
        self.db
            .connection()
            .call(move |conn| {
                let affected = conn.execute(
                    "INSERT INTO subscription
                         (item_id, chat_id, source, name, item, last_offset, error)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT DO NOTHING",
                    params![item_id, chat_id, source, name, item, offset, NOT_STARTED],
                )?;
                Ok(affected == 1)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn get(&self, id: &SubscriptionId) -> Result<Option<Subscription>, FanlineError> {
        let item_id = id.item.clone();
        let chat_id = id.chat_id.0;
        let source = id.source.clone();
        self.db
            .connection()
            .call(move |conn| {
                let sub = conn
                    .query_row(
                        &format!(
                            "SELECT {SELECT_COLUMNS} FROM subscription
                             WHERE item_id = ?1 AND chat_id = ?2 AND source = ?3
                             LIMIT 1"
                        ),
                        params![item_id, chat_id, source],
                        row_to_subscription,
                    )
                    .optional()?;
                Ok(sub)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn advance(&self, chat_id: ChatId) -> Result<Option<Subscription>, FanlineError> {
        let chat_id = chat_id.0;
        self.db
            .connection()
            .call(move |conn| {
                let sub = conn
                    .query_row(
                        &format!(
                            "SELECT {SELECT_COLUMNS} FROM subscription
                             WHERE chat_id = ?1 AND error IS NULL
                             ORDER BY CASE WHEN updated IS NULL THEN 0 ELSE 1 END,
                                      updated, rowid
                             LIMIT 1"
                        ),
                        params![chat_id],
                        row_to_subscription,
                    )
                    .optional()?;
                Ok(sub)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn change(&self, id: &SubscriptionId, change: Change) -> Result<bool, FanlineError> {
        let item_id = id.item.clone();
        let chat_id = id.chat_id.0;
        let source = id.source.clone();
        self.db
            .connection()
            .call(move |conn| {
                let affected = match change {
                    Change::Commit { raw_data, offset } => conn.execute(
                        "UPDATE subscription
                         SET item = ?1, last_offset = ?2,
                             updated = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE item_id = ?3 AND chat_id = ?4 AND source = ?5
                           AND error IS NULL AND last_offset <= ?2",
                        params![raw_data.as_bytes(), offset, item_id, chat_id, source],
                    )?,
                    Change::Suspend { reason } => {
                        let reason: String = reason.chars().take(MAX_ERROR_LEN).collect();
                        conn.execute(
                            "UPDATE subscription
                             SET error = ?1,
                                 updated = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                             WHERE item_id = ?2 AND chat_id = ?3 AND source = ?4
                               AND error IS NULL",
                            params![reason, item_id, chat_id, source],
                        )?
                    }
                    Change::Resume => conn.execute(
                        "UPDATE subscription
                         SET error = NULL,
                             updated = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE item_id = ?1 AND chat_id = ?2 AND source = ?3
                           AND error IS NOT NULL",
                        params![item_id, chat_id, source],
                    )?,
                    Change::Delete => conn.execute(
                        "DELETE FROM subscription
                         WHERE item_id = ?1 AND chat_id = ?2 AND source = ?3",
                        params![item_id, chat_id, source],
                    )?,
                };
                Ok(affected == 1)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn active_chats(&self) -> Result<Vec<ChatId>, FanlineError> {
        self.db
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT chat_id FROM subscription
                     WHERE error IS NULL
                     ORDER BY chat_id",
                )?;
                let chats = stmt
                    .query_map([], |row| row.get::<_, i64>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(chats.into_iter().map(ChatId).collect())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn list(
        &self,
        chat_id: ChatId,
        active: bool,
    ) -> Result<Vec<Subscription>, FanlineError> {
        let chat_id = chat_id.0;
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM subscription
                     WHERE chat_id = ?1 AND (error IS NULL) = ?2
                     ORDER BY name, rowid"
                ))?;
                let subs = stmt
                    .query_map(params![chat_id, active], row_to_subscription)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(subs)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn clear(&self, chat_id: ChatId, pattern: &str) -> Result<u64, FanlineError> {
        let chat_id = chat_id.0;
        let pattern = pattern.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let affected = conn.execute(
                    "DELETE FROM subscription
                     WHERE chat_id = ?1 AND error IS NOT NULL AND error LIKE ?2",
                    params![chat_id, pattern],
                )?;
                Ok(affected as u64)
            })
            .await
            .map_err(map_tr_err)
    }
}
