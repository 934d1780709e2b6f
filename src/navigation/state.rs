//! Session state types

use crate::db::NodeId;
use serde::{Deserialize, Serialize};

/// Where a user is in the tree and how they got there.
///
/// `history` holds one entry per forward move since the last reset, so
/// popping it restores exactly the previous `current_node_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// `None` = at the virtual root
    #[serde(default)]
    pub current_node_id: Option<NodeId>,
    #[serde(default)]
    pub history: Vec<Option<NodeId>>,
}

impl SessionState {
    pub fn depth(&self) -> usize {
        self.history.len()
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn menu_identity(&self) -> MenuIdentity {
        MenuIdentity::for_depth(self.depth())
    }
}

/// Presentation identity of a menu, alternating by depth parity.
///
/// Purely cosmetic: lets the transport re-skin adjacent levels differently
/// (e.g. distinct inline-keyboard ids) without separate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuIdentity {
    Even,
    Odd,
}

impl MenuIdentity {
    pub fn for_depth(depth: usize) -> Self {
        if depth.is_multiple_of(2) {
            MenuIdentity::Even
        } else {
            MenuIdentity::Odd
        }
    }

    pub fn menu_id(self) -> &'static str {
        match self {
            MenuIdentity::Even => "discover-a",
            MenuIdentity::Odd => "discover-b",
        }
    }
}
