//! SQLite shared tier
//!
//! One WAL-mode database file per host, opened by every server process, so a
//! summary computed by one process is served by the others.
//!
//! Schema:
//! - cache_metadata: schema version
//! - shared_entries: key, expiry (unix millis), bincode payload
//!
//! A schema version mismatch clears all entries on open.

use super::shared::{SharedTier, SharedValue};
use crate::error::CoreError;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Current schema version
///
/// Version History:
/// - v1: Initial version
const CACHE_VERSION: i32 = 1;

/// SQLite-backed [`SharedTier`] (thread-safe)
pub struct SqliteSharedTier {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteSharedTier {
    /// Create or open the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open cache database: {}", path.display()))?;

        // Enable WAL mode so several processes can read while one writes
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL mode")?;
        conn.busy_timeout(Duration::from_millis(20))
            .context("Failed to set busy timeout")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_metadata (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS shared_entries (
                key TEXT PRIMARY KEY,
                expires_at INTEGER NOT NULL,
                data BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_expires_at ON shared_entries(expires_at);
            "#,
        )
        .context("Failed to create schema")?;

        let stored_version: Option<i32> = conn
            .query_row(
                "SELECT value FROM cache_metadata WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query cache version")?;

        match stored_version {
            Some(v) if v == CACHE_VERSION => {
                debug!("Shared cache version {} matches current", CACHE_VERSION);
            }
            stored => {
                if let Some(v) = stored {
                    warn!(
                        stored = v,
                        current = CACHE_VERSION,
                        "Shared cache version mismatch, clearing entries"
                    );
                }
                conn.execute("DELETE FROM shared_entries", [])
                    .context("Failed to clear stale cache")?;
                conn.execute(
                    "INSERT OR REPLACE INTO cache_metadata (key, value) VALUES ('version', ?)",
                    params![CACHE_VERSION],
                )
                .context("Failed to update cache version")?;
            }
        }

        debug!(path = %path.display(), "Shared cache initialized");

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove expired rows, returning how many were deleted
    pub fn purge_expired(&self) -> Result<usize, CoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM shared_entries WHERE expires_at <= ?",
            params![Utc::now().timestamp_millis()],
        )
        .map_err(unavailable)
    }

    /// Delete every entry
    pub fn clear(&self) -> Result<usize, CoreError> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM shared_entries", [])
            .map_err(unavailable)?;
        debug!(removed, "Shared cache cleared");
        Ok(removed)
    }

    /// Number of rows, including expired ones not yet purged
    pub fn entry_count(&self) -> Result<usize, CoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM shared_entries", [], |row| row.get(0))
            .map_err(unavailable)?;
        Ok(count as usize)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn.lock().map_err(|e| CoreError::SharedCacheUnavailable {
            message: format!("Shared cache lock poisoned: {}", e),
        })
    }
}

impl SharedTier for SqliteSharedTier {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Result<Option<SharedValue>, CoreError> {
        let now = Utc::now().timestamp_millis();
        let conn = self.lock()?;

        let row: Option<(Vec<u8>, i64)> = conn
            .query_row(
                "SELECT data, expires_at FROM shared_entries WHERE key = ? AND expires_at > ?",
                params![key, now],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(unavailable)?;

        Ok(row.map(|(bytes, expires_at)| SharedValue {
            bytes,
            remaining: Duration::from_millis((expires_at - now).max(0) as u64),
        }))
    }

    fn set(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), CoreError> {
        let expires_at = Utc::now().timestamp_millis() + ttl.as_millis() as i64;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO shared_entries (key, expires_at, data) VALUES (?, ?, ?)",
            params![key, expires_at, bytes],
        )
        .map_err(unavailable)?;
        Ok(())
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize, CoreError> {
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM shared_entries WHERE substr(key, 1, ?) = ?",
                params![prefix.chars().count() as i64, prefix],
            )
            .map_err(unavailable)?;
        debug!(prefix, removed, "Shared cache prefix deleted");
        Ok(removed)
    }
}

impl Drop for SqliteSharedTier {
    fn drop(&mut self) {
        // Keep the WAL file from growing across restarts
        if let Ok(conn) = self.conn.lock() {
            if let Err(e) = conn.pragma_update(None, "wal_checkpoint", "TRUNCATE") {
                warn!("Failed to checkpoint WAL on shared cache drop: {}", e);
            }
        }
    }
}

fn unavailable(e: rusqlite::Error) -> CoreError {
    CoreError::SharedCacheUnavailable {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_set_get_roundtrip_with_ttl() {
        let dir = tempdir().unwrap();
        let tier = SqliteSharedTier::open(&dir.path().join("shared.db")).unwrap();

        tier.set("v1:category:a:summary", b"payload", Duration::from_secs(60))
            .unwrap();
        let value = tier.get("v1:category:a:summary").unwrap().unwrap();
        assert_eq!(value.bytes, b"payload");
        assert!(value.remaining <= Duration::from_secs(60));

        tier.set("v1:expired", b"x", Duration::ZERO).unwrap();
        assert!(tier.get("v1:expired").unwrap().is_none());
        assert_eq!(tier.purge_expired().unwrap(), 1);
    }

    #[test]
    fn test_delete_prefix_is_literal() {
        let dir = tempdir().unwrap();
        let tier = SqliteSharedTier::open(&dir.path().join("shared.db")).unwrap();
        let ttl = Duration::from_secs(60);

        tier.set("v1:search:a%25b:p1", b"1", ttl).unwrap();
        tier.set("v1:search:ab:p1", b"2", ttl).unwrap();
        tier.set("v1:list:x:p1", b"3", ttl).unwrap();

        // `%` and `_` carry no pattern meaning
        assert_eq!(tier.delete_prefix("v1:search:a%").unwrap(), 1);
        assert_eq!(tier.delete_prefix("v1:search:").unwrap(), 1);
        assert_eq!(tier.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/shared.db");
        {
            let tier = SqliteSharedTier::open(&path).unwrap();
            tier.set("k", b"v", Duration::from_secs(60)).unwrap();
        }
        let tier = SqliteSharedTier::open(&path).unwrap();
        assert!(tier.get("k").unwrap().is_some());
        assert_eq!(tier.clear().unwrap(), 1);
    }
}
