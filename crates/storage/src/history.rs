// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable build history on embedded SQLite.
//!
//! Two tables: `history` maps build IDs to their latest status record
//! (stored as JSON), and `globals` holds the monotonic build counter under
//! the `count` key. Counter allocation is transactional so IDs never
//! regress, even across a crash mid-allocation.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use wake_core::BuildUpdateData;

/// Errors from the history store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Durable map `build_id → BuildUpdateData` plus the build-ID allocator.
///
/// Clones share one connection; all access is serialized behind a mutex.
/// Operations are short single-statement or single-transaction affairs.
#[derive(Clone)]
pub struct HistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl HistoryStore {
    /// Open (creating if needed) the history database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory store. Nothing survives the connection; test use.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS history (
                build_id INTEGER PRIMARY KEY,
                record TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS globals (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Allocate the next build ID.
    ///
    /// Read-increment-write runs inside one transaction; the counter starts
    /// at zero so the first build is `1`. A failed transaction leaves the
    /// counter untouched.
    pub fn next_build_id(&self) -> Result<i64, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let current: i64 = tx
            .query_row("SELECT value FROM globals WHERE key = 'count'", [], |row| row.get(0))
            .optional()?
            .unwrap_or(0);
        let next = current + 1;
        tx.execute(
            "INSERT INTO globals (key, value) VALUES ('count', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![next],
        )?;
        tx.commit()?;
        Ok(next)
    }

    /// Write (or overwrite) the status record for a build.
    pub fn put_update(&self, data: &BuildUpdateData) -> Result<(), StorageError> {
        let record = serde_json::to_string(data)?;
        self.conn.lock().execute(
            "INSERT INTO history (build_id, record) VALUES (?1, ?2)
             ON CONFLICT(build_id) DO UPDATE SET record = excluded.record",
            params![data.id, record],
        )?;
        Ok(())
    }

    /// Read back the stored status record for a build.
    pub fn get_update(&self, build_id: i64) -> Result<Option<BuildUpdateData>, StorageError> {
        let record: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT record FROM history WHERE build_id = ?1",
                params![build_id],
                |row| row.get(0),
            )
            .optional()?;
        match record {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Number of stored history records. History pruning is enforced by the
    /// settings layer; the store only reports its size.
    pub fn len(&self) -> Result<u64, StorageError> {
        let count: i64 =
            self.conn.lock().query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
