//! Storage abstractions used by the tree cache and session controller
//!
//! These traits let the core run against SQLite in production and against
//! failure-injecting mocks in tests.

use crate::db::{Database, DbError, NewNode, Node, NodeId};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Backing store unreachable, constraint violated, or blob unserialisable.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Failed to encode state for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Storage unavailable: {0}")]
    #[allow(dead_code)] // Constructed by test doubles
    Unavailable(String),
}

/// Repository of discovered nodes
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Nodes whose parent is exactly `parent_id` (`None` = root level)
    async fn children(&self, parent_id: Option<NodeId>) -> Result<Vec<Node>, StorageError>;

    async fn find(&self, id: NodeId) -> Result<Option<Node>, StorageError>;

    /// Atomically insert siblings, skipping names that already exist
    async fn insert_children(
        &self,
        parent_id: Option<NodeId>,
        children: &[NewNode],
        discovered_by: Option<&str>,
    ) -> Result<Vec<Node>, StorageError>;
}

/// Generic persisted key → blob store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Idempotent upsert
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: NodeStore + ?Sized> NodeStore for Arc<T> {
    async fn children(&self, parent_id: Option<NodeId>) -> Result<Vec<Node>, StorageError> {
        (**self).children(parent_id).await
    }

    async fn find(&self, id: NodeId) -> Result<Option<Node>, StorageError> {
        (**self).find(id).await
    }

    async fn insert_children(
        &self,
        parent_id: Option<NodeId>,
        children: &[NewNode],
        discovered_by: Option<&str>,
    ) -> Result<Vec<Node>, StorageError> {
        (**self)
            .insert_children(parent_id, children, discovered_by)
            .await
    }
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        (**self).delete(key).await
    }
}

// ============================================================================
// Key namespacing
// ============================================================================

/// Key prefix convention separating the uses of one key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Navigation state per chat
    Session,
    /// Interactive menu (dialogue) bookkeeping per chat
    Conversation,
}

impl Namespace {
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Session => "session:",
            Namespace::Conversation => "conversation:",
        }
    }

    pub fn key(self, raw: &str) -> String {
        format!("{}{raw}", self.prefix())
    }
}

/// Read and decode a JSON blob.
///
/// An undecodable blob is logged and reported as absent so a corrupt entry
/// never wedges a chat.
pub async fn load_json<T, K>(kv: &K, key: &str) -> Result<Option<T>, StorageError>
where
    T: DeserializeOwned,
    K: KeyValueStore + ?Sized,
{
    let Some(blob) = kv.read(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&blob) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding undecodable state blob");
            Ok(None)
        }
    }
}

/// Encode a value as JSON and upsert it.
pub async fn store_json<T, K>(kv: &K, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + Sync,
    K: KeyValueStore + ?Sized,
{
    let blob = serde_json::to_string(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    kv.write(key, &blob).await
}

// ============================================================================
// Production Adapter
// ============================================================================

/// Adapter to use Database as both node repository and key-value store
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[allow(dead_code)] // Useful for tests
    pub fn inner(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl NodeStore for DatabaseStorage {
    async fn children(&self, parent_id: Option<NodeId>) -> Result<Vec<Node>, StorageError> {
        Ok(self.db.children_of(parent_id)?)
    }

    async fn find(&self, id: NodeId) -> Result<Option<Node>, StorageError> {
        Ok(self.db.find_node(id)?)
    }

    async fn insert_children(
        &self,
        parent_id: Option<NodeId>,
        children: &[NewNode],
        discovered_by: Option<&str>,
    ) -> Result<Vec<Node>, StorageError> {
        Ok(self.db.insert_children(parent_id, children, discovered_by)?)
    }
}

#[async_trait]
impl KeyValueStore for DatabaseStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.db.kv_read(key)?)
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Ok(self.db.kv_write(key, value)?)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        Ok(self.db.kv_delete(key)?)
    }
}
