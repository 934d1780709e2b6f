//! HTTP request handlers

use super::types::{ErrorResponse, ModelInfo, ModelsResponse, RequesterQuery, SelectRequest};
use super::AppState;
use crate::llm::all_models;
use crate::session::{TurnEvent, TurnResponse};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

const MAX_SESSION_KEY_LEN: usize = 128;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Turn protocol
        .route("/api/sessions/:key/start", post(start_session))
        .route("/api/sessions/:key/select", post(select_child))
        .route("/api/sessions/:key/back", post(go_back))
        .route("/api/sessions/:key/close", post(close_menu))
        // Model info
        .route("/api/models", get(list_models))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Turn Protocol
// ============================================================

async fn start_session(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<RequesterQuery>,
) -> Result<Response, AppError> {
    turn(&state, &key, query.requester.as_deref(), TurnEvent::Start).await
}

async fn select_child(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SelectRequest>,
) -> Result<Response, AppError> {
    turn(
        &state,
        &key,
        req.requester.as_deref(),
        TurnEvent::SelectChild(req.node_id),
    )
    .await
}

async fn go_back(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<RequesterQuery>,
) -> Result<Response, AppError> {
    turn(&state, &key, query.requester.as_deref(), TurnEvent::GoBack).await
}

async fn close_menu(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    turn(&state, &key, None, TurnEvent::Close).await
}

async fn turn(
    state: &AppState,
    key: &str,
    requester: Option<&str>,
    event: TurnEvent,
) -> Result<Response, AppError> {
    validate_session_key(key)?;

    let response = state.sessions.handle(key, requester, event).await;
    let status = match response {
        TurnResponse::TryAgain { .. } => StatusCode::SERVICE_UNAVAILABLE,
        TurnResponse::Menu(_) | TurnResponse::Closed => StatusCode::OK,
    };
    Ok((status, Json(response)).into_response())
}

/// Keys become storage keys, so keep them short and printable
fn validate_session_key(key: &str) -> Result<(), AppError> {
    if key.is_empty() || key.len() > MAX_SESSION_KEY_LEN {
        return Err(AppError::BadRequest(format!(
            "Session key must be 1-{MAX_SESSION_KEY_LEN} characters"
        )));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(AppError::BadRequest(
            "Session key may only contain letters, digits, '-', '_' and '.'".to_string(),
        ));
    }
    Ok(())
}

// ============================================================
// Model Info
// ============================================================

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = state
        .llm_registry
        .available_models()
        .into_iter()
        .map(|id| {
            let def = all_models().iter().find(|m| m.id == id);
            ModelInfo {
                provider: def.map_or_else(|| "OpenAI".to_string(), |d| format!("{:?}", d.provider)),
                description: def
                    .map_or("OpenAI-compatible model", |d| d.description)
                    .to_string(),
                id,
            }
        })
        .collect();

    Json(ModelsResponse {
        models,
        default: state.llm_registry.default_model_id().to_string(),
    })
}

async fn get_version() -> &'static str {
    concat!("discovery-tree ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
