//! HTTP routes for the conversation core.
//!
//! Authentication lives elsewhere; requests arrive with the caller's
//! identity already established and carried in the `x-identity-id` and
//! `x-identity-name` headers.

use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use colloquy_conversation::{
    ConversationOrchestrator, HistoryView, Identity, ToolDispatcher, ToolInvocationResult,
    ToolOutcome, TurnReply,
};
use colloquy_core::IdentityId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The conversation engine.
    pub orchestrator: Arc<ConversationOrchestrator>,
    /// Direct tool execution for the tools routes.
    pub dispatcher: Arc<ToolDispatcher>,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat/completions", post(chat_completions))
        .route("/chat/history", get(chat_history).delete(clear_chat_history))
        .route("/tools/list", get(list_tools))
        .route("/tools/{tool_id}/execute", post(execute_tool))
        .with_state(state)
}

/// Request body for a chat turn.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
}

/// Response body for a history clear.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    /// Whether any history existed.
    pub cleared: bool,
}

/// Response body for the tool listing.
#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    /// Tool ids in registration order.
    pub tools: Vec<String>,
    /// Tool id to description.
    pub descriptions: HashMap<String, String>,
}

fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, ApiError> {
    let raw_id = headers
        .get("x-identity-id")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingIdentity)?;

    let id = IdentityId::from_str(raw_id).map_err(|e| ApiError::InvalidIdentity {
        reason: e.to_string(),
    })?;

    let display_name = headers
        .get("x-identity-name")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous");

    Ok(Identity::new(id, display_name))
}

async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<TurnReply>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let reply = state
        .orchestrator
        .handle_turn(&identity, &request.message)
        .await?;
    Ok(Json(reply))
}

async fn chat_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HistoryView>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let view = state.orchestrator.get_history(&identity).await?;
    Ok(Json(view))
}

async fn clear_chat_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ClearResponse>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let cleared = state.orchestrator.clear_history(&identity).await?;
    Ok(Json(ClearResponse { cleared }))
}

async fn list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let registry = state.dispatcher.registry();
    Json(ToolListResponse {
        tools: registry.ids().iter().map(|id| (*id).to_string()).collect(),
        descriptions: registry
            .descriptions()
            .map(|(id, description)| (id.to_string(), description.to_string()))
            .collect(),
    })
}

async fn execute_tool(
    State(state): State<AppState>,
    Path(tool_id): Path<String>,
) -> (StatusCode, Json<ToolInvocationResult>) {
    let result = state.dispatcher.dispatch(&tool_id, JsonValue::Null).await;
    let status = match result.outcome {
        ToolOutcome::NotFound => StatusCode::NOT_FOUND,
        ToolOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
        ToolOutcome::Ok { .. } => StatusCode::OK,
    };
    (status, Json(result))
}
