//! Step Executor (C8, spec §4.8): runs one pending `NormalStep` to
//! completion (or failure), billing it and handing back whatever work item
//! comes next.

use std::collections::BTreeMap;

use chrono::Utc;
use gateway_catalogue::pricing;
use gateway_selector::select_model;
use gateway_shared::event::Event;
use gateway_shared::model::{
    AttachedFile, FileMetadata, LlmConfig, LlmMessage, ModelCapability, NormalStep, PdfConfig,
    PdfEngine, ReasoningConfig, ReasoningEffort, StepStatus, Task, TaskStatus, TaskStep,
    WebSearchConfig,
};
use gateway_shared::work_item::WorkItem;
use gateway_shared::{GatewayError, GatewayResult};
use gateway_store::StepUpdate;
use uuid::Uuid;

use crate::context::OrchestrationContext;
use crate::dispatch::work_item_for_step;
use crate::prompts;

const STEP_TEMPERATURE: f32 = 0.7;

/// Runs a pending normal step. Preconditions: the step exists, is a
/// `NormalStep`, and is `pending`.
pub async fn execute_step(
    ctx: &OrchestrationContext,
    task_id: Uuid,
    user_id: Uuid,
    api_key: &str,
    step_id: Uuid,
) -> GatewayResult<Vec<WorkItem>> {
    let step = ctx.store.get_step(step_id).await?.ok_or_else(|| GatewayError::NotFound(format!("step {step_id}")))?;
    let normal = step
        .as_normal()
        .cloned()
        .ok_or_else(|| GatewayError::InvalidArgument(format!("step {step_id} is not a normal step")))?;
    if normal.header.status != StepStatus::Pending {
        return Err(GatewayError::InvalidArgument(format!(
            "step {step_id} is not pending (status {:?})",
            normal.header.status
        )));
    }
    let task = ctx.store.get_task(task_id, user_id).await?.ok_or_else(|| GatewayError::NotFound(format!("task {task_id}")))?;

    // Step 1: select a model if one hasn't already been assigned.
    let model_name = match &normal.model_name {
        Some(model_name) => model_name.clone(),
        None => {
            let (pdf_engine, reasoning_effort) = derive_capability_hints(&normal.required_capabilities);
            let attached_files = ctx.files.get_files(&normal.required_file_ids, user_id).await?;
            match select_model(
                &ctx.catalogue,
                &ctx.scoring,
                &normal.header.prompt,
                &normal.required_capabilities,
                &attached_files,
                pdf_engine,
                reasoning_effort,
            )
            .await
            {
                Ok(selected) => {
                    ctx.store
                        .update_step(
                            step_id,
                            StepUpdate {
                                model_name: Some(selected.model_id.clone()),
                                predicted_score: Some(selected.score),
                                predicted_length: Some(selected.predicted_length),
                                ..Default::default()
                            },
                        )
                        .await?;
                    selected.model_id
                }
                Err(GatewayError::NoSuitableModel(reason)) => {
                    return handle_no_suitable_model(ctx, task_id, user_id, api_key, &normal, &reason).await;
                }
                Err(e) => return Err(e),
            }
        }
    };

    // Step 2: transition to in_progress.
    ctx.store
        .update_step(
            step_id,
            StepUpdate { status: Some(StepStatus::InProgress), started_at: Some(Utc::now()), ..Default::default() },
        )
        .await?;

    // Steps 3-6: build context, load files, derive config, call the LLM.
    // Any failure here is this step's own, not the queue's, to classify.
    match run_step_completion(ctx, &task, &normal, &model_name, api_key).await {
        Ok((response, attached_files)) => {
            finish_successful_call(ctx, &task, &normal, &model_name, api_key, step_id, response, attached_files).await
        }
        Err(e) => {
            let now = Utc::now();
            ctx.store
                .update_step(
                    step_id,
                    StepUpdate {
                        status: Some(StepStatus::Failed),
                        failure_reason: Some(e.to_string()),
                        completed_at: Some(now),
                        ..Default::default()
                    },
                )
                .await?;
            ctx.store.update_task_final(task_id, TaskStatus::Failed, now, None).await?;
            ctx.events.publish(
                user_id,
                Event::new(
                    "task.failed",
                    serde_json::json!({"task_id": task_id, "step_id": step_id, "reason": e.to_string()}),
                )
                .with_metadata("task_id", task_id.to_string()),
            );
            Ok(Vec::new())
        }
    }
}

async fn run_step_completion(
    ctx: &OrchestrationContext,
    task: &Task,
    normal: &NormalStep,
    model_name: &str,
    api_key: &str,
) -> GatewayResult<(LlmMessage, Vec<FileMetadata>)> {
    let siblings = ctx
        .store
        .get_steps(task.id, task.user_id, true)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("task {}", task.id)))?;

    let mut previous_steps = String::new();
    for sibling in &siblings {
        if sibling.step_number() >= normal.header.step_number || sibling.status() != StepStatus::Completed {
            continue;
        }
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

    let full_prompt =
        prompts::build_step_context(task.title_or_prompt(), &previous_steps, normal.header.step_number, &normal.header.prompt);

    let attached_files = ctx.files.get_files(&normal.required_file_ids, task.user_id).await?;
    let attached: Vec<AttachedFile> = attached_files.iter().map(pricing::to_attached_file).collect();
    let message = LlmMessage::user_with_files(full_prompt, attached);

    let (pdf_engine, reasoning_effort) = derive_capability_hints(&normal.required_capabilities);
    let config = build_llm_config(&normal.required_capabilities, pdf_engine, reasoning_effort);

    let mut requested = BTreeMap::new();
    requested.insert("output".to_string(), prompts::TASK_STEP_OUTPUT_DESCRIPTION.to_string());
    requested.insert("failure_reason".to_string(), prompts::TASK_STEP_FAILURE_REASON_DESCRIPTION.to_string());

    let response = ctx
        .llm
        .complete(api_key, model_name, std::slice::from_ref(&message), &requested, STEP_TEMPERATURE, &config)
        .await?;

    Ok((response, attached_files))
}

#[allow(clippy::too_many_arguments)]
async fn finish_successful_call(
    ctx: &OrchestrationContext,
    task: &Task,
    normal: &NormalStep,
    model_name: &str,
    api_key: &str,
    step_id: Uuid,
    response: LlmMessage,
    attached_files: Vec<FileMetadata>,
) -> GatewayResult<Vec<WorkItem>> {
    let task_id = task.id;
    let user_id = task.user_id;

    // Step 7: bill what actually happened.
    let model_desc = ctx
        .catalogue
        .get_by_id(model_name)
        .await?
        .ok_or_else(|| GatewayError::Internal(format!("selected model '{model_name}' vanished from catalogue")))?;
    let cost = pricing::actual_cost(&model_desc, &response, &attached_files);
    ctx.store.add_cost_increment(task_id, cost).await?;

    // Step 8: classify.
    let output = response.additional_data.get("output").cloned();
    let failure_reason = response
        .additional_data
        .get("failure_reason")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let now = Utc::now();

    if let Some(reason) = failure_reason {
        ctx.store
            .update_step(
                step_id,
                StepUpdate {
                    status: Some(StepStatus::CouldNotComplete),
                    failure_reason: Some(reason.clone()),
                    completed_at: Some(now),
                    ..Default::default()
                },
            )
            .await?;
        ctx.events.publish(
            user_id,
            Event::new("task.step_completed", serde_json::json!({"task_id": task_id, "step_id": step_id, "status": "could_not_complete"}))
                .with_metadata("task_id", task_id.to_string()),
        );

        let next_step_number = normal.header.step_number + 1;
        let synth_prompt = format!("Step {} could not be completed: {reason}", normal.header.step_number);
        let reevaluate_step =
            ctx.store.create_synthesized_reevaluate_step(task_id, next_step_number, &synth_prompt, false).await?;
        return Ok(vec![work_item_for_step(task_id, user_id, api_key, &reevaluate_step)]);
    }

    let output_text = output.unwrap_or_default();
    ctx.store
        .update_step(
            step_id,
            StepUpdate {
                status: Some(StepStatus::Completed),
                output: Some(output_text.clone()),
                completed_at: Some(now),
                ..Default::default()
            },
        )
        .await?;
    ctx.events.publish(
        user_id,
        Event::new("task.step_completed", serde_json::json!({"task_id": task_id, "step_id": step_id, "status": "completed"}))
            .with_metadata("task_id", task_id.to_string()),
    );

    let siblings = ctx
        .store
        .get_steps(task_id, user_id, true)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("task {task_id}")))?;

    if let Some(next_step) = siblings.iter().find(|s| s.step_number() == normal.header.step_number + 1) {
        return Ok(vec![work_item_for_step(task_id, user_id, api_key, next_step)]);
    }

    let all_completed = siblings.iter().all(|s| s.status() == StepStatus::Completed);
    if all_completed {
        ctx.store.update_task_final(task_id, TaskStatus::Completed, now, Some(&output_text)).await?;
        ctx.events.publish(
            user_id,
            Event::new("task.completed", serde_json::json!({"task_id": task_id, "output": output_text}))
                .with_metadata("task_id", task_id.to_string()),
        );
    }

    Ok(Vec::new())
}

async fn handle_no_suitable_model(
    ctx: &OrchestrationContext,
    task_id: Uuid,
    user_id: Uuid,
    api_key: &str,
    normal: &NormalStep,
    reason: &str,
) -> GatewayResult<Vec<WorkItem>> {
    let now = Utc::now();
    ctx.store
        .update_step(
            normal.header.id,
            StepUpdate {
                status: Some(StepStatus::CouldNotComplete),
                failure_reason: Some(reason.to_string()),
                completed_at: Some(now),
                ..Default::default()
            },
        )
        .await?;
    ctx.events.publish(
        user_id,
        Event::new(
            "task.step_completed",
            serde_json::json!({"task_id": task_id, "step_id": normal.header.id, "status": "could_not_complete"}),
        )
        .with_metadata("task_id", task_id.to_string()),
    );

    let next_step_number = normal.header.step_number + 1;
    let synth_prompt = format!("Step {} has no suitable model: {reason}", normal.header.step_number);
    let reevaluate_step =
        ctx.store.create_synthesized_reevaluate_step(task_id, next_step_number, &synth_prompt, false).await?;
    Ok(vec![work_item_for_step(task_id, user_id, api_key, &reevaluate_step)])
}

fn derive_capability_hints(required_capabilities: &[ModelCapability]) -> (PdfEngine, ReasoningEffort) {
    let pdf_engine = required_capabilities
        .iter()
        .find_map(|c| match c {
            ModelCapability::NativePdf => Some(PdfEngine::Native),
            ModelCapability::OcrPdf => Some(PdfEngine::MistralOcr),
            ModelCapability::TextPdf => Some(PdfEngine::PdfText),
            _ => None,
        })
        .unwrap_or(PdfEngine::PdfText);
    let reasoning_effort = if required_capabilities.contains(&ModelCapability::Reasoning) {
        ReasoningEffort::Medium
    } else {
        ReasoningEffort::None
    };
    (pdf_engine, reasoning_effort)
}

fn build_llm_config(required_capabilities: &[ModelCapability], pdf_engine: PdfEngine, reasoning_effort: ReasoningEffort) -> LlmConfig {
    let wants_exa = required_capabilities.contains(&ModelCapability::ExaSearch);
    let wants_native = required_capabilities.contains(&ModelCapability::NativeWebSearch);
    LlmConfig {
        web_search: WebSearchConfig {
            use_exa: wants_exa,
            use_native: wants_native,
            max_results: if wants_exa || wants_native { 5 } else { 0 },
            context_size: None,
            search_prompt: None,
        },
        reasoning: ReasoningConfig { effort: reasoning_effort },
        pdf: PdfConfig { engine: pdf_engine },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pdf_capability_defaults_to_text_engine_and_no_reasoning() {
        let (engine, effort) = derive_capability_hints(&[]);
        assert_eq!(engine, PdfEngine::PdfText);
        assert_eq!(effort, ReasoningEffort::None);
    }

    #[test]
    fn ocr_capability_selects_mistral_engine() {
        let (engine, _) = derive_capability_hints(&[ModelCapability::OcrPdf]);
        assert_eq!(engine, PdfEngine::MistralOcr);
    }

    #[test]
    fn reasoning_capability_requests_medium_effort() {
        let (_, effort) = derive_capability_hints(&[ModelCapability::Reasoning]);
        assert_eq!(effort, ReasoningEffort::Medium);
    }

    #[test]
    fn web_search_config_only_enabled_when_capability_requested() {
        let config = build_llm_config(&[], PdfEngine::PdfText, ReasoningEffort::None);
        assert!(!config.web_search.use_exa);
        assert!(!config.web_search.use_native);
        assert_eq!(config.web_search.max_results, 0);

        let config = build_llm_config(&[ModelCapability::NativeWebSearch], PdfEngine::PdfText, ReasoningEffort::None);
        assert!(config.web_search.use_native);
        assert_eq!(config.web_search.max_results, 5);
    }
}
