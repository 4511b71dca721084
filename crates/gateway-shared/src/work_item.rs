//! Work queue item (spec §3, §4.6 / C10).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemKind {
    Decompose,
    Execute,
    Reevaluate,
}

/// A unit of orchestration work. `step_id` is absent for `Decompose` (the
/// task has no steps yet) and present for `Execute` / `Reevaluate`. Carries
/// the user's upstream `api_key` since C7/C8/C9 need it for every LLM call
/// and the queue is the only thing threading it from the originating
/// request through to the consumer loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub api_key: String,
    pub kind: WorkItemKind,
    pub step_id: Option<Uuid>,
}

impl WorkItem {
    pub fn decompose(task_id: Uuid, user_id: Uuid, api_key: impl Into<String>) -> Self {
        Self { task_id, user_id, api_key: api_key.into(), kind: WorkItemKind::Decompose, step_id: None }
    }

    pub fn execute(task_id: Uuid, user_id: Uuid, api_key: impl Into<String>, step_id: Uuid) -> Self {
        Self { task_id, user_id, api_key: api_key.into(), kind: WorkItemKind::Execute, step_id: Some(step_id) }
    }

    pub fn reevaluate(task_id: Uuid, user_id: Uuid, api_key: impl Into<String>, step_id: Uuid) -> Self {
        Self { task_id, user_id, api_key: api_key.into(), kind: WorkItemKind::Reevaluate, step_id: Some(step_id) }
    }
}
