//! Child-concept generation using the generative oracle
//!
//! Every call goes to the oracle; memoization is the tree cache's job.
//! Both output modes share one post-processing contract ([`finalize`]):
//! trim, drop empty names, drop names already taken by a sibling, drop
//! in-batch duplicates, keep at most [`MAX_CANDIDATES`].

use crate::llm::{LlmError, LlmRequest, LlmService, ResponseSchema};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Most candidates a single generation round may yield
pub const MAX_CANDIDATES: usize = 4;
/// Names requested in simple mode
const SIMPLE_REQUEST_COUNT: usize = 4;
/// Items requested in structured mode; extra headroom survives sibling filtering
const STRUCTURED_REQUEST_COUNT: usize = 10;
const SCHEMA_NAME: &str = "record_concepts";

/// A proposed child, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub emoji: Option<String>,
}

impl Candidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emoji: None,
        }
    }

    pub fn with_emoji(name: impl Into<String>, emoji: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emoji: Some(emoji.into()),
        }
    }
}

/// Oracle unreachable, malformed, or schema-invalid
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Oracle request failed: {0}")]
    Oracle(#[from] LlmError),
    #[error("Malformed oracle response: {0}")]
    Malformed(String),
    #[error("Oracle response violates schema: {0}")]
    Schema(String),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Oracle(e) => e.kind.is_retryable(),
            GenerationError::Malformed(_) | GenerationError::Schema(_) => true,
        }
    }
}

/// Output contract requested from the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationMode {
    /// Comma-separated plain text names
    Simple,
    /// Strict JSON schema with `{name, emoji}` items
    #[default]
    Structured,
}

impl FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(GenerationMode::Simple),
            "structured" => Ok(GenerationMode::Structured),
            other => Err(format!("unknown generation mode: {other}")),
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::Simple => f.write_str("simple"),
            GenerationMode::Structured => f.write_str("structured"),
        }
    }
}

/// Source of candidate children for a parent concept
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, parent_name: &str) -> Result<Vec<Candidate>, GenerationError>;
}

#[async_trait]
impl<T: ContentGenerator + ?Sized> ContentGenerator for Arc<T> {
    async fn generate(&self, parent_name: &str) -> Result<Vec<Candidate>, GenerationError> {
        (**self).generate(parent_name).await
    }
}

/// Generator backed by an LLM
pub struct LlmGenerator<L> {
    llm: L,
    mode: GenerationMode,
}

impl<L: LlmService> LlmGenerator<L> {
    pub fn new(llm: L, mode: GenerationMode) -> Self {
        Self { llm, mode }
    }

    fn build_request(&self, parent_name: &str) -> LlmRequest {
        match self.mode {
            GenerationMode::Simple => LlmRequest::prompt(format!(
                "Parent element: {parent_name}"
            ))
            .with_system(format!(
                "You invent elements for a discovery game. Given a parent element, reply \
                 with exactly {SIMPLE_REQUEST_COUNT} sub-elements or closely related concepts. \
                 Reply with only the names, separated by commas, and nothing else."
            ))
            .with_max_tokens(100),
            GenerationMode::Structured => LlmRequest::prompt(format!(
                "Parent element: {parent_name}"
            ))
            .with_system(format!(
                "You invent elements for a discovery game. Given a parent element, propose \
                 exactly {STRUCTURED_REQUEST_COUNT} distinct sub-elements or concepts derivable \
                 from it. Each item has a short name and a single fitting emoji."
            ))
            .with_max_tokens(600)
            .with_schema(concept_schema()),
        }
    }
}

#[async_trait]
impl<L: LlmService> ContentGenerator for LlmGenerator<L> {
    async fn generate(&self, parent_name: &str) -> Result<Vec<Candidate>, GenerationError> {
        let request = self.build_request(parent_name);
        let response = self.llm.complete(&request).await?;

        let raw = match self.mode {
            GenerationMode::Simple => parse_simple(&response.text()),
            GenerationMode::Structured => {
                let payload = response
                    .json_payload()
                    .map_err(|e| GenerationError::Malformed(e.to_string()))?;
                parse_structured(payload)?
            }
        };

        let candidates = finalize(raw, &[]);
        tracing::debug!(
            parent = parent_name,
            mode = %self.mode,
            count = candidates.len(),
            "Generated candidates"
        );
        Ok(candidates)
    }
}

/// JSON schema for structured mode: exactly N `{name, emoji}` objects
fn concept_schema() -> ResponseSchema {
    ResponseSchema {
        name: SCHEMA_NAME.to_string(),
        description: "Record the generated child concepts".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "minItems": STRUCTURED_REQUEST_COUNT,
                    "maxItems": STRUCTURED_REQUEST_COUNT,
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "emoji": { "type": "string" }
                        },
                        "required": ["name", "emoji"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["items"],
            "additionalProperties": false
        }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConceptBatch {
    items: Vec<ConceptItem>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConceptItem {
    name: String,
    emoji: String,
}

fn parse_simple(text: &str) -> Vec<Candidate> {
    text.split(',').map(Candidate::new).collect()
}

/// Strict parse. An empty `items` list is the "nothing new" outcome, not an error.
fn parse_structured(payload: Value) -> Result<Vec<Candidate>, GenerationError> {
    let batch: ConceptBatch =
        serde_json::from_value(payload).map_err(|e| GenerationError::Schema(e.to_string()))?;

    if !batch.items.is_empty() && batch.items.len() != STRUCTURED_REQUEST_COUNT {
        return Err(GenerationError::Schema(format!(
            "expected {STRUCTURED_REQUEST_COUNT} items, got {}",
            batch.items.len()
        )));
    }

    Ok(batch
        .items
        .into_iter()
        .map(|item| Candidate {
            name: item.name,
            emoji: Some(item.emoji),
        })
        .collect())
}

/// Trim, drop empty names and names already in `taken`, drop repeats, cap.
pub fn finalize(raw: Vec<Candidate>, taken: &[String]) -> Vec<Candidate> {
    let mut seen: HashSet<String> = taken.iter().cloned().collect();

    raw.into_iter()
        .filter_map(|c| {
            let name = c.name.trim().to_string();
            let emoji = c
                .emoji
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty());
            (!name.is_empty() && seen.insert(name.clone())).then_some(Candidate { name, emoji })
        })
        .take(MAX_CANDIDATES)
        .collect()
}
