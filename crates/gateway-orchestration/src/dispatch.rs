//! Turns a freshly (re)generated step into the work item that will drive it,
//! by its persisted `step_type` - shared by C7, C8, and C9, which all need to
//! enqueue "whatever comes next" without knowing in advance which kind of
//! step that is.

use gateway_shared::model::{StepType, TaskStep};
use gateway_shared::work_item::WorkItem;
use uuid::Uuid;

pub fn work_item_for_step(task_id: Uuid, user_id: Uuid, api_key: &str, step: &TaskStep) -> WorkItem {
    match step.step_type() {
        StepType::Normal => WorkItem::execute(task_id, user_id, api_key, step.id()),
        StepType::Reevaluate => WorkItem::reevaluate(task_id, user_id, api_key, step.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_shared::model::{Complexity, NormalStep, ReevaluateStep, StepHeader, StepStatus};
    use gateway_shared::work_item::WorkItemKind;

    fn header(step_id: Uuid, task_id: Uuid) -> StepHeader {
        StepHeader {
            id: step_id,
            task_id,
            step_number: 0,
            prompt: "do the thing".to_string(),
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            response_content: None,
        }
    }

    #[test]
    fn normal_step_dispatches_to_execute() {
        let task_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let step_id = Uuid::new_v4();
        let step = TaskStep::Normal(NormalStep {
            header: header(step_id, task_id),
            complexity: Complexity::Low,
            required_capabilities: Vec::new(),
            required_file_ids: Vec::new(),
            model_name: None,
            predicted_score: None,
            predicted_length: None,
            output: None,
            failure_reason: None,
        });

        let item = work_item_for_step(task_id, user_id, "key", &step);
        assert_eq!(item.kind, WorkItemKind::Execute);
        assert_eq!(item.step_id, Some(step_id));
    }

    #[test]
    fn reevaluate_step_dispatches_to_reevaluate() {
        let task_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let step_id = Uuid::new_v4();
        let step = TaskStep::Reevaluate(ReevaluateStep { header: header(step_id, task_id), is_planned: true });

        let item = work_item_for_step(task_id, user_id, "key", &step);
        assert_eq!(item.kind, WorkItemKind::Reevaluate);
        assert_eq!(item.step_id, Some(step_id));
    }
}
