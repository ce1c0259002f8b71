// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations, tracked via `PRAGMA user_version`.

use rusqlite::Connection;

/// Ordered migration scripts. `user_version` records how many have run.
const MIGRATIONS: &[&str] = &[
    // v1: the subscription table. `updated` is NULL until the first commit
    // so never-committed rows sort first in round-robin selection.
    "CREATE TABLE subscription (
        item_id     TEXT    NOT NULL,
        chat_id     INTEGER NOT NULL,
        source      TEXT    NOT NULL,
        name        TEXT    NOT NULL,
        item        BLOB    NOT NULL,
        last_offset INTEGER NOT NULL DEFAULT 0,
        updated     TEXT,
        error       TEXT
    );
    CREATE UNIQUE INDEX i_subscription_id
        ON subscription (item_id, chat_id, source);
    CREATE INDEX i_subscription_rotation
        ON subscription (chat_id, error, updated);",
];

/// Apply all migrations newer than the database's `user_version`.
pub fn apply(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    for (i, migration) in MIGRATIONS.iter().enumerate().skip(version as usize) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration)?;
        tx.pragma_update(None, "user_version", (i + 1) as i64)?;
        tx.commit()?;
    }
    Ok(())
}
