//! Decomposer (C7, spec §4.7): turns a task's prompt into a persisted step
//! plan and the work item that starts executing it.

use std::collections::BTreeMap;

use gateway_shared::event::Event;
use gateway_shared::model::LlmConfig;
use gateway_shared::model::LlmMessage;
use gateway_shared::work_item::WorkItem;
use gateway_shared::{GatewayError, GatewayResult};
use uuid::Uuid;

use crate::context::OrchestrationContext;
use crate::dispatch::work_item_for_step;
use crate::plan::{parse_steps, parse_title};
use crate::prompts;

const DECOMPOSITION_TEMPERATURE: f32 = 0.7;

/// Calls the LLM for a plan, persists it, emits `task.steps_generated`, and
/// returns a follow-up work item for step 0 if the plan has one.
pub async fn decompose_and_queue(
    ctx: &OrchestrationContext,
    task_id: Uuid,
    user_id: Uuid,
    api_key: &str,
) -> GatewayResult<Vec<WorkItem>> {
    let task = ctx
        .store
        .get_task(task_id, user_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("task {task_id}")))?;

    let messages = [LlmMessage::user(prompts::build_decomposition_prompt(&task.prompt))];

    let mut requested = BTreeMap::new();
    requested.insert("title".to_string(), prompts::TASK_TITLE_DESCRIPTION.to_string());
    requested.insert("steps".to_string(), prompts::build_steps_description());

    let response = ctx
        .llm
        .complete(
            api_key,
            &ctx.decomposition_model,
            &messages,
            &requested,
            DECOMPOSITION_TEMPERATURE,
            &LlmConfig::default(),
        )
        .await?;

    let title = parse_title(response.additional_data.get("title").map(String::as_str));
    let steps = parse_steps(response.additional_data.get("steps").map(String::as_str))?;

    let updated_task = ctx.store.update_after_decomposition(task_id, &title, &steps).await?;

    ctx.events.publish(
        user_id,
        Event::new(
            "task.steps_generated",
            serde_json::json!({"task_id": task_id, "title": updated_task.title}),
        )
        .with_metadata("task_id", task_id.to_string()),
    );

    let first_step = ctx
        .store
        .get_steps(task_id, user_id, true)
        .await?
        .and_then(|steps| steps.into_iter().next());

    Ok(first_step
        .map(|step| work_item_for_step(task_id, user_id, api_key, &step))
        .into_iter()
        .collect())
}
