//! Database schema and types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id INTEGER,
    name TEXT NOT NULL,
    emoji TEXT,
    discovered_by TEXT,
    created_at TEXT NOT NULL
);

-- No foreign key on parent_id: children may outlive a purged parent row.
-- Plain UNIQUE(parent_id, name) treats NULL parents as distinct, which
-- would allow duplicate root-level names. Autoincrement ids start at 1.
CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_sibling_name
    ON nodes(IFNULL(parent_id, 0), name);

CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id);

CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Node identifier, assigned by the database on insert.
pub type NodeId = i64;

/// A discovered concept in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// `None` for root-level concepts
    pub parent_id: Option<NodeId>,
    pub name: String,
    pub emoji: Option<String>,
    /// Whose turn triggered generation; provenance only
    pub discovered_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Node {
    /// Button label: emoji prefix when the oracle supplied one.
    pub fn label(&self) -> String {
        match self.emoji.as_deref() {
            Some(emoji) if !emoji.is_empty() => format!("{emoji} {}", self.name),
            _ => self.name.clone(),
        }
    }
}

/// A child to insert under some parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub name: String,
    pub emoji: Option<String>,
}

impl NewNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emoji: None,
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn with_emoji(name: impl Into<String>, emoji: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emoji: Some(emoji.into()),
        }
    }
}
