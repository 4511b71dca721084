//! Thin chat-thread surface (spec §6, §10.4): no orchestration state
//! machine, each message is answered by a single direct C2 call.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gateway_shared::model::{ChatMessage, ChatRole, ChatThread, LlmConfig, LlmMessage};
use gateway_shared::{GatewayError, GatewayResult};

use crate::auth::{AuthenticatedUser, OpenRouterKey};
use crate::state::AppState;

#[derive(Deserialize)]
struct CreateThreadRequest {
    title: Option<String>,
}

async fn create_thread(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(body): Json<CreateThreadRequest>,
) -> GatewayResult<Json<ChatThread>> {
    Ok(Json(state.chat.create_thread(auth.user_id, body.title.as_deref()).await?))
}

async fn list_threads(State(state): State<AppState>, auth: AuthenticatedUser) -> GatewayResult<Json<Vec<ChatThread>>> {
    Ok(Json(state.chat.list_threads(auth.user_id).await?))
}

#[derive(Deserialize)]
struct SendMessageRequest {
    content: String,
    model: String,
}

#[derive(Serialize)]
struct ThreadMessages {
    user_message: ChatMessage,
    assistant_message: ChatMessage,
}

async fn send_message(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    OpenRouterKey(api_key): OpenRouterKey,
    Path(thread_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> GatewayResult<Json<ThreadMessages>> {
    state
        .chat
        .get_thread(thread_id, auth.user_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("chat thread {thread_id}")))?;

    let user_message = state.chat.add_message(thread_id, ChatRole::User, &body.content).await?;

    let history = state.chat.list_messages(thread_id).await?;
    let messages: Vec<LlmMessage> = history
        .iter()
        .map(|m| match m.role {
            ChatRole::User => LlmMessage::user(m.content.clone()),
            ChatRole::Assistant => LlmMessage {
                role: gateway_shared::model::Role::Assistant,
                content: m.content.clone(),
                files: Vec::new(),
                prompt_tokens: None,
                completion_tokens: None,
                additional_data: std::collections::HashMap::new(),
            },
        })
        .collect();

    let response = state
        .orchestration
        .llm
        .complete(&api_key, &body.model, &messages, &BTreeMap::new(), 0.7, &LlmConfig::default())
        .await?;

    let assistant_message = state.chat.add_message(thread_id, ChatRole::Assistant, &response.content).await?;

    Ok(Json(ThreadMessages { user_message, assistant_message }))
}

async fn list_messages(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(thread_id): Path<Uuid>,
) -> GatewayResult<Json<Vec<ChatMessage>>> {
    state
        .chat
        .get_thread(thread_id, auth.user_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("chat thread {thread_id}")))?;
    Ok(Json(state.chat.list_messages(thread_id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat/threads", post(create_thread).get(list_threads))
        .route("/chat/threads/{id}/messages", get(list_messages).post(send_message))
}
