//! Mock implementations for testing
//!
//! These mocks enable exercising the tree cache and session controller
//! without a real oracle and with injectable storage failures.

use crate::db::{Database, NewNode, Node, NodeId};
use crate::generator::{Candidate, ContentGenerator, GenerationError};
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::store::{DatabaseStorage, KeyValueStore, NodeStore, StorageError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Mock LLM Service
// ============================================================================

/// Mock LLM service that returns queued responses
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    /// Record of all requests made
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_text(&self, text: &str) {
        self.queue_response(LlmResponse::from_text(text));
    }

    pub fn queue_json(&self, value: &Value) {
        self.queue_response(LlmResponse::from_text(value.to_string()));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Mock Generator
// ============================================================================

/// Generator returning queued batches; an empty queue yields no candidates.
pub struct MockGenerator {
    batches: Mutex<VecDeque<Result<Vec<Candidate>, GenerationError>>>,
    calls: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_names(&self, names: &[&str]) {
        self.queue_batch(names.iter().map(|n| Candidate::new(*n)).collect());
    }

    pub fn queue_batch(&self, batch: Vec<Candidate>) {
        self.batches.lock().unwrap().push_back(Ok(batch));
    }

    pub fn queue_error(&self, error: GenerationError) {
        self.batches.lock().unwrap().push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Parent names, one per call
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn generate(&self, parent_name: &str) -> Result<Vec<Candidate>, GenerationError> {
        self.calls.lock().unwrap().push(parent_name.to_string());
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ============================================================================
// Flaky Storage
// ============================================================================

/// Real SQLite storage with switchable failures
pub struct FlakyStorage {
    inner: DatabaseStorage,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    kv_writes: AtomicUsize,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self {
            inner: DatabaseStorage::new(Database::open_in_memory().unwrap()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            kv_writes: AtomicUsize::new(0),
        }
    }

    pub fn db(&self) -> &Database {
        self.inner.inner()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fails node inserts and key-value writes/deletes
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn kv_write_count(&self) -> usize {
        self.kv_writes.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<(), StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeStore for FlakyStorage {
    async fn children(&self, parent_id: Option<NodeId>) -> Result<Vec<Node>, StorageError> {
        self.check_read()?;
        self.inner.children(parent_id).await
    }

    async fn find(&self, id: NodeId) -> Result<Option<Node>, StorageError> {
        self.check_read()?;
        self.inner.find(id).await
    }

    async fn insert_children(
        &self,
        parent_id: Option<NodeId>,
        children: &[NewNode],
        discovered_by: Option<&str>,
    ) -> Result<Vec<Node>, StorageError> {
        self.check_write()?;
        self.inner
            .insert_children(parent_id, children, discovered_by)
            .await
    }
}

#[async_trait]
impl KeyValueStore for FlakyStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_read()?;
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_write()?;
        self.kv_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.check_write()?;
        self.inner.delete(key).await
    }
}
