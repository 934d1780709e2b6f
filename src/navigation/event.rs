//! Events that move a session through the tree

use crate::db::NodeId;
use serde::{Deserialize, Serialize};

/// Navigation events driving state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavEvent {
    /// Descend into a child of the current node
    SelectChild { child_id: NodeId },
    /// Return to the previously current node
    GoBack,
    /// Jump to the root and forget history
    Reset,
}
