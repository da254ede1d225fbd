//! SQLite-backed memory store
//!
//! Persists the conversation memory tiers across restarts. Implements the
//! same contract as the in-memory store: string and list values with
//! per-key TTL, expired keys reading as absent.

use crate::backend::{BackendError, MemoryStore};
use crate::storage::Database;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;
use std::time::Duration;

/// Durable memory store over the kv_entries / list_items tables
pub struct SqliteMemoryStore {
    db: Arc<Database>,
}

impl SqliteMemoryStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry_millis(ttl: Duration) -> i64 {
    now_millis().saturating_add(ttl.as_millis() as i64)
}

fn store_err(e: impl std::fmt::Display) -> BackendError {
    BackendError::Unavailable {
        capability: "memory-store",
        reason: e.to_string(),
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let conn = self.db.get_conn().map_err(store_err)?;
        let now = now_millis();

        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT value, expires_at FROM kv_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(store_err)?;

        if let Some((value, expires_at)) = row {
            if now >= expires_at {
                conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
                    .map_err(store_err)?;
                return Ok(None);
            }
            return Ok(Some(value));
        }

        let list_expiry: Option<i64> = conn
            .query_row(
                "SELECT expires_at FROM list_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;

        match list_expiry {
            Some(expires_at) if now < expires_at => Err(BackendError::InvalidInput(format!(
                "key {} holds a list, not a value",
                key
            ))),
            _ => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        let mut conn = self.db.get_conn().map_err(store_err)?;
        let tx = conn.transaction().map_err(store_err)?;

        // Overwrite whatever was there before, list or value
        tx.execute("DELETE FROM list_items WHERE key = ?1", params![key])
            .map_err(store_err)?;
        tx.execute("DELETE FROM list_meta WHERE key = ?1", params![key])
            .map_err(store_err)?;
        tx.execute(
            "INSERT OR REPLACE INTO kv_entries (key, value, expires_at) VALUES (?1, ?2, ?3)",
            params![key, value, expiry_millis(ttl)],
        )
        .map_err(store_err)?;

        tx.commit().map_err(store_err)
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let mut conn = self.db.get_conn().map_err(store_err)?;
        let tx = conn.transaction().map_err(store_err)?;

        tx.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
            .map_err(store_err)?;
        tx.execute("DELETE FROM list_items WHERE key = ?1", params![key])
            .map_err(store_err)?;
        tx.execute("DELETE FROM list_meta WHERE key = ?1", params![key])
            .map_err(store_err)?;

        tx.commit().map_err(store_err)
    }

    async fn list_append(
        &self,
        key: &str,
        items: &[String],
        ttl: Duration,
    ) -> Result<usize, BackendError> {
        let mut conn = self.db.get_conn().map_err(store_err)?;
        let tx = conn.transaction().map_err(store_err)?;
        let now = now_millis();

        let kv_expiry: Option<i64> = tx
            .query_row(
                "SELECT expires_at FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        match kv_expiry {
            Some(expires_at) if now < expires_at => {
                return Err(BackendError::InvalidInput(format!(
                    "key {} holds a value, not a list",
                    key
                )));
            }
            Some(_) => {
                tx.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
                    .map_err(store_err)?;
            }
            None => {}
        }

        let list_expiry: Option<i64> = tx
            .query_row(
                "SELECT expires_at FROM list_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        if matches!(list_expiry, Some(expires_at) if now >= expires_at) {
            tx.execute("DELETE FROM list_items WHERE key = ?1", params![key])
                .map_err(store_err)?;
        }

        for item in items {
            tx.execute(
                "INSERT INTO list_items (key, item) VALUES (?1, ?2)",
                params![key, item],
            )
            .map_err(store_err)?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO list_meta (key, expires_at) VALUES (?1, ?2)",
            params![key, expiry_millis(ttl)],
        )
        .map_err(store_err)?;

        let count: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM list_items WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .map_err(store_err)?;

        tx.commit().map_err(store_err)?;
        Ok(count as usize)
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, BackendError> {
        let mut conn = self.db.get_conn().map_err(store_err)?;
        let tx = conn.transaction().map_err(store_err)?;
        let now = now_millis();

        let kv_expiry: Option<i64> = tx
            .query_row(
                "SELECT expires_at FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        if matches!(kv_expiry, Some(expires_at) if now < expires_at) {
            return Err(BackendError::InvalidInput(format!(
                "key {} holds a value, not a list",
                key
            )));
        }

        let list_expiry: Option<i64> = tx
            .query_row(
                "SELECT expires_at FROM list_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;

        match list_expiry {
            Some(expires_at) if now < expires_at => {
                let mut stmt = tx
                    .prepare("SELECT item FROM list_items WHERE key = ?1 ORDER BY id ASC")
                    .map_err(store_err)?;
                let rows = stmt
                    .query_map(params![key], |row| row.get::<_, String>(0))
                    .map_err(store_err)?;
                let mut items = Vec::new();
                for row in rows {
                    items.push(row.map_err(store_err)?);
                }
                drop(stmt);
                tx.commit().map_err(store_err)?;
                Ok(items)
            }
            Some(_) => {
                tx.execute("DELETE FROM list_items WHERE key = ?1", params![key])
                    .map_err(store_err)?;
                tx.execute("DELETE FROM list_meta WHERE key = ?1", params![key])
                    .map_err(store_err)?;
                tx.commit().map_err(store_err)?;
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn list_trim_last(&self, key: &str, keep: usize) -> Result<(), BackendError> {
        let conn = self.db.get_conn().map_err(store_err)?;
        conn.execute(
            "DELETE FROM list_items WHERE key = ?1 AND id NOT IN (
                SELECT id FROM list_items WHERE key = ?1 ORDER BY id DESC LIMIT ?2
            )",
            params![key, keep as i64],
        )
        .map_err(store_err)?;
        Ok(())
    }
}
