//! Generate-once cache over the concept tree
//!
//! The first request that finds a parent without children generates and
//! persists a batch; every later request gets the stored batch back. The
//! first batch is final: a parent with one child never grows further.

use crate::db::{NewNode, Node, NodeId};
use crate::generator::{finalize, Candidate, ContentGenerator, GenerationError};
use crate::store::{NodeStore, StorageError};
use thiserror::Error;

/// Parent name handed to the generator for root-level concepts
pub const ROOT_NAME: &str = "Root";
/// Parent name used when a referenced parent row is missing
pub const UNKNOWN_PARENT_NAME: &str = "Unknown";

#[derive(Debug, Error)]
pub enum TreeError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

pub struct TreeCache<S, G> {
    store: S,
    generator: G,
    /// Canonical root concepts used instead of the oracle for the root
    /// batch; processed like any other batch, so at most four are stored
    root_seeds: Vec<String>,
}

impl<S: NodeStore, G: ContentGenerator> TreeCache<S, G> {
    pub fn new(store: S, generator: G) -> Self {
        Self {
            store,
            generator,
            root_seeds: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_root_seeds(mut self, seeds: Vec<String>) -> Self {
        self.root_seeds = seeds;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Children of `parent_id`, generating and persisting them on first use.
    ///
    /// The result always comes from storage, never from unpersisted
    /// candidates. On generator failure nothing is written.
    pub async fn get_or_generate_children(
        &self,
        parent_id: Option<NodeId>,
        requester: Option<&str>,
    ) -> Result<Vec<Node>, TreeError> {
        let existing = self.store.children(parent_id).await?;
        if !existing.is_empty() {
            tracing::debug!(?parent_id, count = existing.len(), "Children cache hit");
            return Ok(existing);
        }

        let candidates = if parent_id.is_none() && !self.root_seeds.is_empty() {
            self.root_seeds.iter().map(Candidate::new).collect()
        } else {
            let parent_name = self.parent_name(parent_id).await?;
            self.generator.generate(&parent_name).await?
        };

        // A concurrent request may have stored its batch while the oracle ran
        let taken: Vec<String> = self
            .store
            .children(parent_id)
            .await?
            .into_iter()
            .map(|n| n.name)
            .collect();
        if !taken.is_empty() {
            tracing::info!(
                ?parent_id,
                siblings = taken.len(),
                "Concurrent batch landed during generation"
            );
        }

        let batch: Vec<NewNode> = finalize(candidates, &taken)
            .into_iter()
            .map(|c| NewNode {
                name: c.name,
                emoji: c.emoji,
            })
            .collect();
        let inserted = self
            .store
            .insert_children(parent_id, &batch, requester)
            .await?;

        tracing::info!(
            ?parent_id,
            requested = batch.len(),
            inserted = inserted.len(),
            requester = requester.unwrap_or("-"),
            "Generated children"
        );

        Ok(self.store.children(parent_id).await?)
    }

    async fn parent_name(&self, parent_id: Option<NodeId>) -> Result<String, TreeError> {
        let Some(id) = parent_id else {
            return Ok(ROOT_NAME.to_string());
        };

        match self.store.find(id).await? {
            Some(parent) => Ok(parent.name),
            None => {
                tracing::warn!(
                    parent_id = id,
                    fallback = UNKNOWN_PARENT_NAME,
                    "Integrity warning: parent node not found"
                );
                Ok(UNKNOWN_PARENT_NAME.to_string())
            }
        }
    }
}
