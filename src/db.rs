use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;
use crate::storage::KeyValueStore;

pub const DB_FILE: &str = "pocketbook.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT DEFAULT (datetime('now'))
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Key-value blobs kept in a single SQLite table.
const UPSERT: &str = "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now')) \
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    /// Keys with the size of their stored value, for status output.
    pub fn sizes(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare("SELECT key, length(value) FROM kv ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl KeyValueStore for SqliteStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(UPSERT, rusqlite::params![key, value])?;
        Ok(())
    }

    fn write_many(&mut self, entries: &[(&str, String)]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (key, value) in entries {
            tx.execute(UPSERT, rusqlite::params![key, value])?;
        }
        tx.commit()?;
        Ok(())
    }
}
