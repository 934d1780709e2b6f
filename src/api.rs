//! HTTP adapter for the turn protocol
//!
//! Maps the four inbound events onto [`SessionController::handle`] and
//! serialises the resulting [`TurnResponse`](crate::session::TurnResponse).

mod handlers;
mod types;

pub use handlers::create_router;

use crate::generator::ContentGenerator;
use crate::llm::ModelRegistry;
use crate::session::SessionController;
use crate::store::DatabaseStorage;
use std::sync::Arc;

pub type Sessions = SessionController<DatabaseStorage, Arc<dyn ContentGenerator>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<Sessions>,
    pub llm_registry: Arc<ModelRegistry>,
}

impl AppState {
    pub fn new(sessions: Sessions, llm_registry: Arc<ModelRegistry>) -> Self {
        Self {
            sessions: Arc::new(sessions),
            llm_registry,
        }
    }
}
