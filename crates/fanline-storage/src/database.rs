// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use fanline_core::FanlineError;
use tokio_rusqlite::Connection;

use crate::migrations;

/// Handle to the SQLite database backing the subscription store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, configure pragmas, and run
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, FanlineError> {
        let conn = Connection::open(path).await.map_err(map_tr_err)?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, FanlineError> {
        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            migrations::apply(conn)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
        Ok(Self { conn })
    }

    /// The shared connection; all queries go through `connection().call(..)`.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Close the background connection thread.
    pub async fn close(self) -> Result<(), FanlineError> {
        self.conn
            .close()
            .await
            .map_err(|e| FanlineError::Storage {
                source: Box::new(e),
            })
    }
}

/// Map a tokio-rusqlite error into the storage error variant.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> FanlineError {
    FanlineError::Storage {
        source: Box::new(e),
    }
}
