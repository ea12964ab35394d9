//! Durable cache tier operations
//!
//! Plain key/value rows with an expiry timestamp, sitting behind the
//! in-process caches. Expired rows are invisible to reads; they are
//! reclaimed by `purge_expired_cache_entries` at startup or overwritten by
//! the next write to the same key.

use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Result as SqliteResult};

use super::super::Database;

impl Database {
    /// Store a cache value under `key`, replacing any previous row.
    pub fn put_cache_entry(&self, key: &str, value: &str, ttl: Duration) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        let expires_at =
            (Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64)).to_rfc3339();

        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, expires_at)
             VALUES (?1, ?2, ?3)",
            params![key, value, expires_at],
        )?;

        Ok(())
    }

    /// Fetch a cache value. Expired rows read as absent.
    pub fn get_cache_entry(&self, key: &str) -> SqliteResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        let mut stmt = conn.prepare(
            "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2",
        )?;

        let mut rows = stmt.query_map(params![key, now], |row| row.get::<_, String>(0))?;
        Ok(rows.next().transpose()?)
    }

    pub fn delete_cache_entry(&self, key: &str) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM cache_entries WHERE key = ?1", [key])?;
        Ok(())
    }

    /// Drop every expired row. Returns how many were removed.
    pub fn purge_expired_cache_entries(&self) -> SqliteResult<usize> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute("DELETE FROM cache_entries WHERE expires_at <= ?1", [now.as_str()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_put_get_round_trip() {
        let (_dir, db) = test_db();

        db.put_cache_entry("response:abc", "{\"message\":\"hi\"}", Duration::from_secs(60))
            .unwrap();

        let value = db.get_cache_entry("response:abc").unwrap();
        assert_eq!(value.as_deref(), Some("{\"message\":\"hi\"}"));
        assert!(db.get_cache_entry("response:other").unwrap().is_none());
    }

    #[test]
    fn test_put_replaces_existing_row() {
        let (_dir, db) = test_db();

        db.put_cache_entry("k", "old", Duration::from_secs(60)).unwrap();
        db.put_cache_entry("k", "new", Duration::from_secs(60)).unwrap();

        assert_eq!(db.get_cache_entry("k").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn test_expired_row_reads_as_absent() {
        let (_dir, db) = test_db();

        db.put_cache_entry("k", "v", Duration::ZERO).unwrap();
        assert!(db.get_cache_entry("k").unwrap().is_none());
    }

    #[test]
    fn test_delete_and_purge() {
        let (_dir, db) = test_db();

        db.put_cache_entry("dead", "v", Duration::ZERO).unwrap();
        db.put_cache_entry("live", "v", Duration::from_secs(60)).unwrap();
        db.put_cache_entry("gone", "v", Duration::from_secs(60)).unwrap();

        db.delete_cache_entry("gone").unwrap();
        assert!(db.get_cache_entry("gone").unwrap().is_none());

        assert_eq!(db.purge_expired_cache_entries().unwrap(), 1);
        assert_eq!(db.get_cache_entry("live").unwrap().as_deref(), Some("v"));
    }
}
