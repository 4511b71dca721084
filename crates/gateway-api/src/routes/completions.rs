//! `POST /completions` and `POST /completions/stream` (spec §6, §4.2, C11).

use std::collections::BTreeMap;

use axum::extract::State;
use axum::response::sse::{KeepAlive, Sse};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use gateway_shared::model::{LlmConfig, LlmMessage};
use gateway_shared::GatewayResult;

use crate::auth::{AuthenticatedUser, OpenRouterKey};
use crate::state::AppState;
use crate::stream::completion_events;

#[derive(Deserialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<LlmMessage>,
    #[serde(default)]
    additional_requested_data: BTreeMap<String, String>,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default)]
    config: LlmConfig,
}

fn default_temperature() -> f32 {
    0.7
}

async fn complete(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    OpenRouterKey(api_key): OpenRouterKey,
    Json(body): Json<CompletionRequest>,
) -> GatewayResult<Json<LlmMessage>> {
    let response = state
        .orchestration
        .llm
        .complete(&api_key, &body.model, &body.messages, &body.additional_requested_data, body.temperature, &body.config)
        .await?;
    Ok(Json(response))
}

async fn stream_completion(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    OpenRouterKey(api_key): OpenRouterKey,
    Json(body): Json<CompletionRequest>,
) -> Sse<impl futures::Stream<Item = Result<axum::response::sse::Event, axum::Error>>> {
    let events = completion_events(
        state.orchestration.clone(),
        api_key,
        body.model,
        body.messages,
        body.additional_requested_data,
        body.temperature,
        body.config,
    );
    Sse::new(events).keep_alive(KeepAlive::default())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/completions", post(complete))
        .route("/completions/stream", post(stream_completion))
}
