//! SQLite cache backend.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tracing::trace;

use super::{CacheBackend, CacheItem, InstalledVersion};
use crate::{Error, Result};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS cache_items (
    name TEXT PRIMARY KEY,
    version TEXT NOT NULL,
    time TIMESTAMP NOT NULL,
    path TEXT NOT NULL,
    tool TEXT NOT NULL,
    commands TEXT NOT NULL DEFAULT '[]',
    patterns TEXT NOT NULL DEFAULT '[]'
)";

const COLUMNS: &str = "name, version, time, path, tool, commands, patterns";

/// Cache stored in an SQLite database; `name` holds the item id.
#[derive(Debug)]
pub struct SqliteCache {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| sql_error("open", &e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| sql_error("create schema", &e))?;
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// Open a throwaway in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| sql_error("open", &e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| sql_error("create schema", &e))?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sql_error(operation: &str, err: &rusqlite::Error) -> Error {
    Error::cache(format!("sqlite {operation} failed: {err}"))
}

struct Row {
    id: String,
    version: String,
    time: String,
    path: String,
    tool: String,
    commands: String,
    patterns: String,
}

impl Row {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            version: row.get(1)?,
            time: row.get(2)?,
            path: row.get(3)?,
            tool: row.get(4)?,
            commands: row.get(5)?,
            patterns: row.get(6)?,
        })
    }

    fn into_item(self) -> Result<CacheItem> {
        let updated = DateTime::parse_from_rfc3339(&self.time)
            .map_err(|e| Error::cache(format!("invalid time for {}: {e}", self.id)))?
            .with_timezone(&Utc);
        let decode = |raw: &str| -> Result<Vec<String>> {
            serde_json::from_str(raw)
                .map_err(|e| Error::cache(format!("invalid list for {}: {e}", self.id)))
        };
        Ok(CacheItem {
            version: InstalledVersion {
                version: self.version.clone(),
                commands: decode(&self.commands)?,
                patterns: decode(&self.patterns)?,
            },
            name: self.tool.clone(),
            path: PathBuf::from(&self.path),
            updated,
            id: self.id,
        })
    }
}

impl CacheBackend for SqliteCache {
    fn get(&self, id: &str) -> Result<Option<CacheItem>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM cache_items WHERE name = ?1"),
                params![id],
                Row::read,
            )
            .optional()
            .map_err(|e| sql_error("select", &e))?;
        row.map(Row::into_item).transpose()
    }

    fn get_all(&self) -> Result<Vec<CacheItem>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {COLUMNS} FROM cache_items ORDER BY name"))
            .map_err(|e| sql_error("prepare", &e))?;
        let rows = stmt
            .query_map([], Row::read)
            .map_err(|e| sql_error("select", &e))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row.map_err(|e| sql_error("read row", &e))?.into_item()?);
        }
        Ok(items)
    }

    fn save(&self, item: CacheItem) -> Result<()> {
        let commands = serde_json::to_string(&item.version.commands)
            .map_err(|e| Error::cache(e.to_string()))?;
        let patterns = serde_json::to_string(&item.version.patterns)
            .map_err(|e| Error::cache(e.to_string()))?;

        let conn = self.conn.lock();
        conn.execute(
            &format!("INSERT OR REPLACE INTO cache_items ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                item.id,
                item.version.version,
                item.updated.to_rfc3339_opts(SecondsFormat::Nanos, true),
                item.path.to_string_lossy(),
                item.name,
                commands,
                patterns,
            ],
        )
        .map_err(|e| sql_error("insert", &e))?;
        trace!(id = %item.id, "Saved cache row");
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute("DELETE FROM cache_items WHERE name = ?1", params![id])
            .map_err(|e| sql_error("delete", &e))?;
        Ok(changed > 0)
    }

    fn close(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch("PRAGMA optimize")
            .map_err(|e| sql_error("optimize", &e))
    }
}
