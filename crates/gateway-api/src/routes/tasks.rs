//! `POST /task`, `GET /task`, `GET /task/{id}`, `GET /task/{id}/steps`
//! (spec §6, C6).

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use gateway_shared::event::Event;
use gateway_shared::model::{Task, TaskStep};
use gateway_shared::work_item::WorkItem;
use gateway_shared::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, OpenRouterKey};
use crate::state::AppState;

#[derive(Deserialize)]
struct CreateTaskRequest {
    prompt: String,
}

#[derive(Serialize)]
struct TaskWithCost {
    #[serde(flatten)]
    task: Task,
    total_cost: f64,
}

async fn create_task(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    OpenRouterKey(api_key): OpenRouterKey,
    Json(body): Json<CreateTaskRequest>,
) -> GatewayResult<Json<Task>> {
    let task = state.orchestration.store.create_task(auth.user_id, &body.prompt, Utc::now()).await?;

    state.orchestration.events.publish(
        auth.user_id,
        Event::new("task.created", serde_json::json!({"task_id": task.id}))
            .with_metadata("task_id", task.id.to_string()),
    );

    state.queue.enqueue(WorkItem::decompose(task.id, auth.user_id, api_key)).await;
    Ok(Json(task))
}

async fn list_tasks(State(state): State<AppState>, auth: AuthenticatedUser) -> GatewayResult<Json<Vec<Task>>> {
    Ok(Json(state.orchestration.store.list_tasks(auth.user_id).await?))
}

async fn get_task(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> GatewayResult<Json<TaskWithCost>> {
    let task = state
        .orchestration
        .store
        .get_task(id, auth.user_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("task {id}")))?;
    let total_cost = state.orchestration.store.total_cost(id).await?;
    Ok(Json(TaskWithCost { task, total_cost }))
}

async fn get_task_steps(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> GatewayResult<Json<Vec<TaskStep>>> {
    let steps = state
        .orchestration
        .store
        .get_steps(id, auth.user_id, true)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("task {id}")))?;
    Ok(Json(steps))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/task", post(create_task).get(list_tasks))
        .route("/task/{id}", get(get_task))
        .route("/task/{id}/steps", get(get_task_steps))
}
