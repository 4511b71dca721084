//! Reevaluator (C9, spec §4.9): regenerates the remaining plan from live
//! context when a `ReevaluateStep` activates, abandoning whatever was
//! queued after it.

use std::collections::BTreeMap;

use chrono::Utc;
use gateway_shared::event::Event;
use gateway_shared::model::{LlmConfig, LlmMessage, StepStatus, TaskStep};
use gateway_shared::work_item::WorkItem;
use gateway_shared::{GatewayError, GatewayResult};
use gateway_store::StepUpdate;
use uuid::Uuid;

use crate::context::OrchestrationContext;
use crate::dispatch::work_item_for_step;
use crate::plan::parse_steps;
use crate::prompts;

const REEVALUATION_TEMPERATURE: f32 = 0.7;

/// Runs a pending reevaluate step. Preconditions: the step exists, is a
/// `ReevaluateStep`, and every prior non-abandoned step is `completed`.
pub async fn reevaluate(
    ctx: &OrchestrationContext,
    task_id: Uuid,
    user_id: Uuid,
    api_key: &str,
    step_id: Uuid,
) -> GatewayResult<Vec<WorkItem>> {
    let step = ctx.store.get_step(step_id).await?.ok_or_else(|| GatewayError::NotFound(format!("step {step_id}")))?;
    let reevaluate_step = step
        .as_reevaluate()
        .cloned()
        .ok_or_else(|| GatewayError::InvalidArgument(format!("step {step_id} is not a reevaluate step")))?;

    let task = ctx.store.get_task(task_id, user_id).await?.ok_or_else(|| GatewayError::NotFound(format!("task {task_id}")))?;

    let siblings = ctx
        .store
        .get_steps(task_id, user_id, true)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("task {task_id}")))?;

    let priors: Vec<&TaskStep> =
        siblings.iter().filter(|s| s.step_number() < reevaluate_step.header.step_number).collect();
    if priors.iter().any(|s| s.status() != StepStatus::Completed) {
        return Err(GatewayError::DecompositionError(
            "not every prior step has completed; cannot reevaluate yet".to_string(),
        ));
    }

    // Step 1: mark in_progress.
    ctx.store
        .update_step(
            step_id,
            StepUpdate { status: Some(StepStatus::InProgress), started_at: Some(Utc::now()), ..Default::default() },
        )
        .await?;

    // Step 2: build context from prior steps plus this reevaluate step.
    let mut previous_steps = String::new();
    for sibling in &priors {
        match sibling {
            TaskStep::Normal(n) => previous_steps.push_str(&prompts::format_previous_step(
                n.header.step_number,
                &n.header.prompt,
                n.output.as_deref().unwrap_or(""),
            )),
            TaskStep::Reevaluate(r) => {
                previous_steps.push_str(&prompts::format_reevaluate_step(r.header.step_number, &r.header.prompt))
            }
        }
    }
    previous_steps.push_str(&prompts::format_reevaluate_step(
        reevaluate_step.header.step_number,
        &reevaluate_step.header.prompt,
    ));

    // Step 3: ask the LLM for a new steps array only.
    let user_message =
        prompts::build_reevaluation_prompt(&task.prompt, task.title_or_prompt(), &previous_steps);
    let messages = [LlmMessage::user(user_message)];
    let mut requested = BTreeMap::new();
    requested.insert("steps".to_string(), prompts::build_steps_description());

    let response = ctx
        .llm
        .complete(api_key, &ctx.decomposition_model, &messages, &requested, REEVALUATION_TEMPERATURE, &LlmConfig::default())
        .await?;
    let new_defs = parse_steps(response.additional_data.get("steps").map(String::as_str))?;

    // Step 4: mark the reevaluate step completed.
    let now = Utc::now();
    ctx.store
        .update_step(step_id, StepUpdate { status: Some(StepStatus::Completed), completed_at: Some(now), ..Default::default() })
        .await?;
    ctx.events.publish(
        user_id,
        Event::new("task.step_completed", serde_json::json!({"task_id": task_id, "step_id": step_id, "status": "completed"}))
            .with_metadata("task_id", task_id.to_string()),
    );

    // Step 5: abandon whatever was queued after this reevaluation point.
    ctx.store.mark_steps_abandoned_after(task_id, reevaluate_step.header.step_number).await?;

    // Step 6: splice in the regenerated suffix.
    let new_steps = ctx
        .store
        .insert_new_steps_after_reevaluation(task_id, reevaluate_step.header.step_number, &new_defs)
        .await?;
    ctx.events.publish(
        user_id,
        Event::new("task.steps_regenerated", serde_json::json!({"task_id": task_id, "step_count": new_steps.len()}))
            .with_metadata("task_id", task_id.to_string()),
    );

    // Step 7: hand back a work item for the first regenerated step, if any.
    Ok(new_steps
        .first()
        .map(|step| work_item_for_step(task_id, user_id, api_key, step))
        .into_iter()
        .collect())
}
