//! Centralized model definitions for all LLM providers

use super::anthropic::AnthropicModel;
use super::{AnthropicService, LlmError, LlmService, OpenAIService};
use std::sync::Arc;

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl Provider {
    /// Get the environment variable name for this provider's API key
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

/// Factory arguments: API key and optional base URL (gateway or compatible endpoint)
pub type ModelFactory = fn(&str, Option<&str>) -> Result<Arc<dyn LlmService>, LlmError>;

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "claude-4.5-haiku")
    pub id: &'static str,
    pub provider: Provider,
    /// Human-readable description
    pub description: &'static str,
    /// Factory function to create the service
    pub factory: ModelFactory,
}

/// Get all built-in model definitions.
///
/// Concept generation wants fast, cheap models, so the list favours them.
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "claude-4.5-haiku",
            provider: Provider::Anthropic,
            description: "Claude Haiku 4.5 (fast, efficient)",
            factory: |api_key, base| {
                Ok(Arc::new(AnthropicService::new(
                    api_key.to_string(),
                    AnthropicModel::Claude45Haiku,
                    base,
                )?))
            },
        },
        ModelDef {
            id: "claude-4.5-sonnet",
            provider: Provider::Anthropic,
            description: "Claude Sonnet 4.5 (balanced performance)",
            factory: |api_key, base| {
                Ok(Arc::new(AnthropicService::new(
                    api_key.to_string(),
                    AnthropicModel::Claude45Sonnet,
                    base,
                )?))
            },
        },
        ModelDef {
            id: "gpt-4o-mini",
            provider: Provider::OpenAI,
            description: "GPT-4o mini (fast, cheap)",
            factory: |api_key, base| {
                Ok(Arc::new(OpenAIService::new(
                    api_key.to_string(),
                    "gpt-4o-mini",
                    "gpt-4o-mini",
                    base,
                )?))
            },
        },
        ModelDef {
            id: "gpt-4o",
            provider: Provider::OpenAI,
            description: "GPT-4o",
            factory: |api_key, base| {
                Ok(Arc::new(OpenAIService::new(
                    api_key.to_string(),
                    "gpt-4o",
                    "gpt-4o",
                    base,
                )?))
            },
        },
    ]
}
