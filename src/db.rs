//! Database module for the discovery tree
//!
//! Provides persistence for discovered nodes and the key-value blobs
//! backing session and dialogue state.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Database connection lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Node Operations ====================

    /// Children of `parent_id` in insertion order.
    ///
    /// `None` matches root-level nodes only (`IS NULL`), never "all nodes".
    pub fn children_of(&self, parent_id: Option<NodeId>) -> DbResult<Vec<Node>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, parent_id, name, emoji, discovered_by, created_at
             FROM nodes WHERE parent_id IS ?1 ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![parent_id], parse_node_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Get node by ID, `None` when absent
    pub fn find_node(&self, id: NodeId) -> DbResult<Option<Node>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, parent_id, name, emoji, discovered_by, created_at
             FROM nodes WHERE id = ?1",
            params![id],
            parse_node_row,
        )
        .optional()
        .map_err(DbError::from)
    }

    /// Insert a batch of siblings in one transaction.
    ///
    /// Names that collide with an existing sibling (including one inserted
    /// earlier in the same batch) are ignored by the unique index. Returns
    /// only the rows actually written.
    pub fn insert_children(
        &self,
        parent_id: Option<NodeId>,
        children: &[NewNode],
        discovered_by: Option<&str>,
    ) -> DbResult<Vec<Node>> {
        let mut conn = self.conn()?;
        let now = Utc::now();
        let tx = conn.transaction()?;
        let mut inserted = Vec::with_capacity(children.len());

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO nodes (parent_id, name, emoji, discovered_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for child in children {
                let changed = stmt.execute(params![
                    parent_id,
                    child.name,
                    child.emoji,
                    discovered_by,
                    now.to_rfc3339()
                ])?;
                if changed == 0 {
                    continue;
                }
                inserted.push(Node {
                    id: tx.last_insert_rowid(),
                    parent_id,
                    name: child.name.clone(),
                    emoji: child.emoji.clone(),
                    discovered_by: discovered_by.map(String::from),
                    created_at: now,
                });
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Total number of stored nodes
    pub fn count_nodes(&self) -> DbResult<i64> {
        let conn = self.conn()?;
        conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
            .map_err(DbError::from)
    }

    // ==================== Key-Value Operations ====================

    pub fn kv_read(&self, key: &str) -> DbResult<Option<String>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(DbError::from)
    }

    /// Upsert; last write wins
    pub fn kv_write(&self, key: &str, value: &str) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Deleting an absent key is not an error
    pub fn kv_delete(&self, key: &str) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Parse a node row from the database
fn parse_node_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Node> {
    Ok(Node {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        name: row.get(2)?,
        emoji: row.get(3)?,
        discovered_by: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
