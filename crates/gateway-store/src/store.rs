//! `TaskStore`: the only thing allowed to read or write `tasks`/`task_steps`/
//! `task_costs` (spec §4.6, §5's single-writer-per-task invariant).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use gateway_shared::model::{
    Complexity, ModelCapability, NormalStep, ReevaluateStep, StepDefinition, StepHeader,
    StepStatus, StepType, Task, TaskStatus, TaskStep,
};
use gateway_shared::{GatewayError, GatewayResult};

fn db_err(e: sqlx::Error) -> GatewayError {
    GatewayError::Internal(format!("database error: {e}"))
}

/// These enums already derive `snake_case` serde; reusing that instead of a
/// second hand-written string mapping keeps the DB vocabulary in sync with
/// the wire vocabulary by construction.
fn to_db_str<T: Serialize>(value: &T) -> GatewayResult<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        _ => Err(GatewayError::Internal("enum did not serialize to a string".to_string())),
    }
}

fn from_db_str<T: DeserializeOwned>(column: &str, value: &str) -> GatewayResult<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|e| GatewayError::Internal(format!("invalid {column} value {value:?}: {e}")))
}

/// Re-exported for `crate::files`, which persists a different table but
/// wants the same enum-as-snake-case-string convention.
pub(crate) fn to_db_str_pub<T: Serialize>(value: &T) -> GatewayResult<String> {
    to_db_str(value)
}

pub(crate) fn from_db_str_pub<T: DeserializeOwned>(column: &str, value: &str) -> GatewayResult<T> {
    from_db_str(column, value)
}

#[derive(Debug, Serialize, Deserialize)]
struct NormalStepDetails {
    complexity: Complexity,
    required_capabilities: Vec<ModelCapability>,
    required_file_ids: Vec<Uuid>,
    predicted_score: Option<f64>,
    predicted_length: Option<i64>,
    output: Option<String>,
    failure_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReevaluateStepDetails {
    is_planned: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    user_id: Uuid,
    prompt: String,
    title: Option<String>,
    status: String,
    steps_generated: bool,
    output: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TaskRow {
    fn into_task(self) -> GatewayResult<Task> {
        Ok(Task {
            id: self.id,
            user_id: self.user_id,
            prompt: self.prompt,
            title: self.title,
            status: from_db_str("tasks.status", &self.status)?,
            steps_generated: self.steps_generated,
            output: self.output,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StepRow {
    id: Uuid,
    task_id: Uuid,
    step_number: i32,
    prompt: String,
    status: String,
    step_type: String,
    step_details: serde_json::Value,
    model_name: Option<String>,
    response_content: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl StepRow {
    fn into_task_step(self) -> GatewayResult<TaskStep> {
        let header = StepHeader {
            id: self.id,
            task_id: self.task_id,
            step_number: self.step_number,
            prompt: self.prompt,
            status: from_db_str("task_steps.status", &self.status)?,
            started_at: self.started_at,
            completed_at: self.completed_at,
            response_content: self.response_content,
        };
        let step_type: StepType = from_db_str("task_steps.step_type", &self.step_type)?;
        match step_type {
            StepType::Normal => {
                let details: NormalStepDetails = serde_json::from_value(self.step_details)
                    .map_err(|e| GatewayError::Internal(format!("corrupt normal step details: {e}")))?;
                Ok(TaskStep::Normal(NormalStep {
                    header,
                    complexity: details.complexity,
                    required_capabilities: details.required_capabilities,
                    required_file_ids: details.required_file_ids,
                    model_name: self.model_name,
                    predicted_score: details.predicted_score,
                    predicted_length: details.predicted_length,
                    output: details.output,
                    failure_reason: details.failure_reason,
                }))
            }
            StepType::Reevaluate => {
                let details: ReevaluateStepDetails = serde_json::from_value(self.step_details)
                    .map_err(|e| GatewayError::Internal(format!("corrupt reevaluate step details: {e}")))?;
                Ok(TaskStep::Reevaluate(ReevaluateStep { header, is_planned: details.is_planned }))
            }
        }
    }
}

/// Partial update applied to a step; `None` fields are left untouched.
#[derive(Debug, Default)]
pub struct StepUpdate {
    pub status: Option<StepStatus>,
    pub model_name: Option<String>,
    pub response_content: Option<String>,
    pub output: Option<String>,
    pub failure_reason: Option<String>,
    pub predicted_score: Option<f64>,
    pub predicted_length: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    pool: PgPool,
}

const STEP_COLUMNS: &str = "id, task_id, step_number, prompt, status, step_type, step_details, \
                             model_name, response_content, started_at, completed_at";

impl TaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_task(&self, user_id: Uuid, prompt: &str, created_at: DateTime<Utc>) -> GatewayResult<Task> {
        let id = Uuid::now_v7();
        let status = to_db_str(&TaskStatus::Decomposing)?;
        sqlx::query(
            "INSERT INTO tasks (id, user_id, prompt, status, steps_generated, created_at) \
             VALUES ($1, $2, $3, $4, false, $5)",
        )
        .bind(id)
        .bind(user_id)
        .bind(prompt)
        .bind(&status)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(Task {
            id,
            user_id,
            prompt: prompt.to_string(),
            title: None,
            status: TaskStatus::Decomposing,
            steps_generated: false,
            output: None,
            created_at,
            completed_at: None,
        })
    }

    pub async fn get_task(&self, task_id: Uuid, user_id: Uuid) -> GatewayResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(
            "SELECT id, user_id, prompt, title, status, steps_generated, output, created_at, completed_at \
             FROM tasks WHERE id = $1 AND user_id = $2",
        )
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(TaskRow::into_task).transpose()
    }

    pub async fn list_tasks(&self, user_id: Uuid) -> GatewayResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT id, user_id, prompt, title, status, steps_generated, output, created_at, completed_at \
             FROM tasks WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Atomically sets the title, flips the task to `in_progress`, marks
    /// `steps_generated`, and inserts the decomposition's step rows.
    pub async fn update_after_decomposition(
        &self,
        task_id: Uuid,
        title: &str,
        steps: &[StepDefinition],
    ) -> GatewayResult<Task> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let status = to_db_str(&TaskStatus::InProgress)?;

        sqlx::query("UPDATE tasks SET title = $1, status = $2, steps_generated = true WHERE id = $3")
            .bind(title)
            .bind(&status)
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        for (step_number, def) in steps.iter().enumerate() {
            insert_step_row(&mut tx, task_id, step_number as i32, def, true).await?;
        }

        let row: TaskRow = sqlx::query_as(
            "SELECT id, user_id, prompt, title, status, steps_generated, output, created_at, completed_at \
             FROM tasks WHERE id = $1",
        )
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        row.into_task()
    }

    pub async fn update_task_final(
        &self,
        task_id: Uuid,
        status: TaskStatus,
        completed_at: DateTime<Utc>,
        output: Option<&str>,
    ) -> GatewayResult<Option<Task>> {
        let status_str = to_db_str(&status)?;
        sqlx::query("UPDATE tasks SET status = $1, completed_at = $2, output = $3 WHERE id = $4")
            .bind(&status_str)
            .bind(completed_at)
            .bind(output)
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        let row: Option<TaskRow> = sqlx::query_as(
            "SELECT id, user_id, prompt, title, status, steps_generated, output, created_at, completed_at \
             FROM tasks WHERE id = $1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(TaskRow::into_task).transpose()
    }

    pub async fn get_step(&self, step_id: Uuid) -> GatewayResult<Option<TaskStep>> {
        let row: Option<StepRow> =
            sqlx::query_as(&format!("SELECT {STEP_COLUMNS} FROM task_steps WHERE id = $1"))
                .bind(step_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        row.map(StepRow::into_task_step).transpose()
    }

    /// Returns `None` if the task doesn't exist or isn't owned by `user_id`.
    pub async fn get_steps(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        exclude_abandoned: bool,
    ) -> GatewayResult<Option<Vec<TaskStep>>> {
        if self.get_task(task_id, user_id).await?.is_none() {
            return Ok(None);
        }

        let query = if exclude_abandoned {
            format!("SELECT {STEP_COLUMNS} FROM task_steps WHERE task_id = $1 AND status != 'abandoned' ORDER BY step_number ASC")
        } else {
            format!("SELECT {STEP_COLUMNS} FROM task_steps WHERE task_id = $1 ORDER BY step_number ASC")
        };

        let rows: Vec<StepRow> = sqlx::query_as(&query)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(Some(rows.into_iter().map(StepRow::into_task_step).collect::<GatewayResult<Vec<_>>>()?))
    }

    pub async fn update_step(&self, step_id: Uuid, update: StepUpdate) -> GatewayResult<Option<TaskStep>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row: Option<StepRow> =
            sqlx::query_as(&format!("SELECT {STEP_COLUMNS} FROM task_steps WHERE id = $1 FOR UPDATE"))
                .bind(step_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let Some(row) = row else {
            tx.rollback().await.map_err(db_err)?;
            return Ok(None);
        };

        let status_str = match &update.status {
            Some(s) => to_db_str(s)?,
            None => row.status.clone(),
        };
        let model_name = update.model_name.clone().or_else(|| row.model_name.clone());
        let response_content = update.response_content.clone().or_else(|| row.response_content.clone());
        let started_at = update.started_at.or(row.started_at);
        let completed_at = update.completed_at.or(row.completed_at);

        let step_type: StepType = from_db_str("task_steps.step_type", &row.step_type)?;
        let step_details = match step_type {
            StepType::Normal => {
                let mut details: NormalStepDetails = serde_json::from_value(row.step_details.clone())
                    .map_err(|e| GatewayError::Internal(format!("corrupt normal step details: {e}")))?;
                if let Some(output) = update.output.clone() {
                    details.output = Some(output);
                }
                if let Some(failure_reason) = update.failure_reason.clone() {
                    details.failure_reason = Some(failure_reason);
                }
                if update.predicted_score.is_some() {
                    details.predicted_score = update.predicted_score;
                }
                if update.predicted_length.is_some() {
                    details.predicted_length = update.predicted_length;
                }
                serde_json::to_value(details)
            }
            StepType::Reevaluate => Ok(row.step_details.clone()),
        }
        .map_err(|e| GatewayError::Internal(format!("step detail serialization failed: {e}")))?;

        sqlx::query(
            "UPDATE task_steps SET status = $1, model_name = $2, response_content = $3, \
             started_at = $4, completed_at = $5, step_details = $6 WHERE id = $7",
        )
        .bind(&status_str)
        .bind(&model_name)
        .bind(&response_content)
        .bind(started_at)
        .bind(completed_at)
        .bind(&step_details)
        .bind(step_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let updated: StepRow = sqlx::query_as(&format!("SELECT {STEP_COLUMNS} FROM task_steps WHERE id = $1"))
            .bind(step_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        updated.into_task_step().map(Some)
    }

    pub async fn mark_steps_abandoned_after(&self, task_id: Uuid, after_step_number: i32) -> GatewayResult<()> {
        let abandoned = to_db_str(&StepStatus::Abandoned)?;
        sqlx::query("UPDATE task_steps SET status = $1 WHERE task_id = $2 AND step_number > $3")
            .bind(&abandoned)
            .bind(task_id)
            .bind(after_step_number)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn insert_new_steps_after_reevaluation(
        &self,
        task_id: Uuid,
        after_step_number: i32,
        defs: &[StepDefinition],
    ) -> GatewayResult<Vec<TaskStep>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut ids = Vec::with_capacity(defs.len());
        for (i, def) in defs.iter().enumerate() {
            let step_number = after_step_number + 1 + i as i32;
            ids.push(insert_step_row(&mut tx, task_id, step_number, def, true).await?);
        }
        tx.commit().await.map_err(db_err)?;

        let mut steps = Vec::with_capacity(ids.len());
        for id in ids {
            let step = self.get_step(id).await?.ok_or_else(|| {
                GatewayError::Internal(format!("step {id} vanished immediately after insertion"))
            })?;
            steps.push(step);
        }
        Ok(steps)
    }

    /// Synthesizes an unplanned (by default) reevaluate step at a
    /// caller-chosen `step_number` - used by the step executor to recover
    /// from a failed step or an unsatisfiable model selection (spec §4.8,
    /// §4.9).
    pub async fn create_synthesized_reevaluate_step(
        &self,
        task_id: Uuid,
        step_number: i32,
        prompt: &str,
        is_planned: bool,
    ) -> GatewayResult<TaskStep> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let def = StepDefinition {
            prompt: prompt.to_string(),
            step_type: StepType::Reevaluate,
            complexity: None,
            required_capabilities: Vec::new(),
        };
        let id = insert_step_row(&mut tx, task_id, step_number, &def, is_planned).await?;
        tx.commit().await.map_err(db_err)?;

        self.get_step(id)
            .await?
            .ok_or_else(|| GatewayError::Internal(format!("step {id} vanished immediately after insertion")))
    }

    pub async fn add_cost_increment(&self, task_id: Uuid, usd: f64) -> GatewayResult<()> {
        sqlx::query("INSERT INTO task_costs (id, task_id, cost_usd) VALUES ($1, $2, $3)")
            .bind(Uuid::now_v7())
            .bind(task_id)
            .bind(usd)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn total_cost(&self, task_id: Uuid) -> GatewayResult<f64> {
        let (total,): (Option<f64>,) =
            sqlx::query_as("SELECT SUM(cost_usd) FROM task_costs WHERE task_id = $1")
                .bind(task_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(total.unwrap_or(0.0))
    }
}

async fn insert_step_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: Uuid,
    step_number: i32,
    def: &StepDefinition,
    is_planned: bool,
) -> GatewayResult<Uuid> {
    let id = Uuid::now_v7();
    let step_type_str = to_db_str(&def.step_type)?;
    let status_str = to_db_str(&StepStatus::Pending)?;

    let step_details = match def.step_type {
        StepType::Normal => {
            let complexity = def.complexity.ok_or_else(|| {
                GatewayError::DecompositionError("normal step definition missing complexity".to_string())
            })?;
            serde_json::to_value(NormalStepDetails {
                complexity,
                required_capabilities: def.required_capabilities.clone(),
                required_file_ids: Vec::new(),
                predicted_score: None,
                predicted_length: None,
                output: None,
                failure_reason: None,
            })
        }
        StepType::Reevaluate => serde_json::to_value(ReevaluateStepDetails { is_planned }),
    }
    .map_err(|e| GatewayError::Internal(format!("step detail serialization failed: {e}")))?;

    sqlx::query(
        "INSERT INTO task_steps (id, task_id, step_number, prompt, status, step_type, step_details) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(id)
    .bind(task_id)
    .bind(step_number)
    .bind(&def.prompt)
    .bind(&status_str)
    .bind(&step_type_str)
    .bind(&step_details)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_round_trips_through_db_string() {
        let s = to_db_str(&TaskStatus::InProgress).unwrap();
        assert_eq!(s, "in_progress");
        let back: TaskStatus = from_db_str("tasks.status", &s).unwrap();
        assert_eq!(back, TaskStatus::InProgress);
    }

    #[test]
    fn normal_step_details_round_trip_json() {
        let details = NormalStepDetails {
            complexity: Complexity::Medium,
            required_capabilities: vec![ModelCapability::Reasoning],
            required_file_ids: vec![Uuid::nil()],
            predicted_score: Some(0.5),
            predicted_length: Some(100),
            output: None,
            failure_reason: None,
        };
        let value = serde_json::to_value(&details).unwrap();
        let back: NormalStepDetails = serde_json::from_value(value).unwrap();
        assert_eq!(back.required_capabilities, vec![ModelCapability::Reasoning]);
    }

    fn normal_def(prompt: &str) -> StepDefinition {
        StepDefinition {
            prompt: prompt.to_string(),
            step_type: StepType::Normal,
            complexity: Some(Complexity::Low),
            required_capabilities: Vec::new(),
        }
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn create_and_fetch_task_round_trips(pool: PgPool) -> sqlx::Result<()> {
        let store = TaskStore::new(pool);
        let user_id = Uuid::now_v7();
        let created = store.create_task(user_id, "plan a trip", Utc::now()).await.unwrap();

        let fetched = store.get_task(created.id, user_id).await.unwrap().unwrap();
        assert_eq!(fetched.prompt, "plan a trip");
        assert_eq!(fetched.status, TaskStatus::Decomposing);

        let wrong_owner = store.get_task(created.id, Uuid::now_v7()).await.unwrap();
        assert!(wrong_owner.is_none());
        Ok(())
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn decomposition_then_execution_updates_step_details(pool: PgPool) -> sqlx::Result<()> {
        let store = TaskStore::new(pool);
        let user_id = Uuid::now_v7();
        let task = store.create_task(user_id, "write a report", Utc::now()).await.unwrap();

        let steps = vec![normal_def("outline"), normal_def("draft")];
        let updated = store.update_after_decomposition(task.id, "Report task", &steps).await.unwrap();
        assert_eq!(updated.title.as_deref(), Some("Report task"));
        assert!(updated.steps_generated);

        let all_steps = store.get_steps(task.id, user_id, true).await.unwrap().unwrap();
        assert_eq!(all_steps.len(), 2);
        let first_id = all_steps[0].id();

        let update = StepUpdate {
            status: Some(StepStatus::Completed),
            output: Some("the outline".to_string()),
            completed_at: Some(Utc::now()),
            ..Default::default()
        };
        let saved = store.update_step(first_id, update).await.unwrap().unwrap();
        assert_eq!(saved.status(), StepStatus::Completed);
        assert_eq!(saved.as_normal().unwrap().output.as_deref(), Some("the outline"));
        Ok(())
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn reevaluation_abandons_every_later_step(pool: PgPool) -> sqlx::Result<()> {
        let store = TaskStore::new(pool);
        let user_id = Uuid::now_v7();
        let task = store.create_task(user_id, "multi-step plan", Utc::now()).await.unwrap();

        let steps = vec![normal_def("s0"), normal_def("s1"), normal_def("s2")];
        store.update_after_decomposition(task.id, "Plan", &steps).await.unwrap();
        let before = store.get_steps(task.id, user_id, false).await.unwrap().unwrap();
        assert_eq!(before.len(), 3);

        store.mark_steps_abandoned_after(task.id, 0).await.unwrap();

        let after = store.get_steps(task.id, user_id, false).await.unwrap().unwrap();
        for step in &after {
            if step.step_number() > 0 {
                assert_eq!(step.status(), StepStatus::Abandoned);
            } else {
                assert_ne!(step.status(), StepStatus::Abandoned);
            }
        }

        let remaining = store.get_steps(task.id, user_id, true).await.unwrap().unwrap();
        assert_eq!(remaining.len(), 1);
        Ok(())
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn cost_increments_accumulate(pool: PgPool) -> sqlx::Result<()> {
        let store = TaskStore::new(pool);
        let user_id = Uuid::now_v7();
        let task = store.create_task(user_id, "x", Utc::now()).await.unwrap();

        store.add_cost_increment(task.id, 0.25).await.unwrap();
        store.add_cost_increment(task.id, 0.10).await.unwrap();
        let total = store.total_cost(task.id).await.unwrap();
        assert!((total - 0.35).abs() < 1e-9);
        Ok(())
    }
}
