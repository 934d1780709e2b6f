//! API request and response types

use crate::db::NodeId;
use serde::{Deserialize, Serialize};

/// Body of a child selection
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub node_id: NodeId,
    /// Credited as `discovered_by` on newly generated children
    #[serde(default)]
    pub requester: Option<String>,
}

/// Optional requester for body-less events
#[derive(Debug, Default, Deserialize)]
pub struct RequesterQuery {
    #[serde(default)]
    pub requester: Option<String>,
}

/// Model information with metadata
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub description: String,
}

/// Response for model list
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
