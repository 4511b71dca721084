//! Task / TaskStep data model (spec §3).
//!
//! `TaskStep` is a tagged union over a shared header: the discriminator and
//! per-variant payload are persisted separately by `gateway-store` and
//! reassembled here on read, keeping a single canonical in-memory shape
//! regardless of the storage layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Decomposing,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prompt: String,
    pub title: Option<String>,
    pub status: TaskStatus,
    pub steps_generated: bool,
    pub output: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// The text used to seed step-execution prompts before a title exists.
    pub fn title_or_prompt(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    CouldNotComplete,
    Failed,
    Abandoned,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CouldNotComplete | Self::Failed | Self::Abandoned
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCapability {
    Reasoning,
    ExaSearch,
    NativeWebSearch,
    OcrPdf,
    TextPdf,
    NativePdf,
}

/// Persistence discriminator for the `TaskStep` tagged union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Normal,
    Reevaluate,
}

/// Attributes common to both step variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepHeader {
    pub id: Uuid,
    pub task_id: Uuid,
    pub step_number: i32,
    pub prompt: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub response_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalStep {
    pub header: StepHeader,
    pub complexity: Complexity,
    pub required_capabilities: Vec<ModelCapability>,
    pub required_file_ids: Vec<Uuid>,
    pub model_name: Option<String>,
    pub predicted_score: Option<f64>,
    pub predicted_length: Option<i64>,
    pub output: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReevaluateStep {
    pub header: StepHeader,
    pub is_planned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step_type", rename_all = "snake_case")]
pub enum TaskStep {
    Normal(NormalStep),
    Reevaluate(ReevaluateStep),
}

impl TaskStep {
    pub fn header(&self) -> &StepHeader {
        match self {
            Self::Normal(s) => &s.header,
            Self::Reevaluate(s) => &s.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut StepHeader {
        match self {
            Self::Normal(s) => &mut s.header,
            Self::Reevaluate(s) => &mut s.header,
        }
    }

    pub fn id(&self) -> Uuid {
        self.header().id
    }

    pub fn step_number(&self) -> i32 {
        self.header().step_number
    }

    pub fn status(&self) -> StepStatus {
        self.header().status
    }

    pub fn step_type(&self) -> StepType {
        match self {
            Self::Normal(_) => StepType::Normal,
            Self::Reevaluate(_) => StepType::Reevaluate,
        }
    }

    /// Output text contributed to downstream step context, if the step has
    /// produced one. Reevaluate steps never contribute output text.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Normal(s) => s.output.as_deref(),
            Self::Reevaluate(_) => None,
        }
    }

    pub fn as_normal(&self) -> Option<&NormalStep> {
        match self {
            Self::Normal(s) => Some(s),
            Self::Reevaluate(_) => None,
        }
    }

    pub fn as_reevaluate(&self) -> Option<&ReevaluateStep> {
        match self {
            Self::Reevaluate(s) => Some(s),
            Self::Normal(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostIncrement {
    pub id: Uuid,
    pub task_id: Uuid,
    pub usd: f64,
    pub created_at: DateTime<Utc>,
}

/// A single step definition as produced by decomposition or reevaluation,
/// before it has been assigned a `step_number` and persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub prompt: String,
    pub step_type: StepType,
    pub complexity: Option<Complexity>,
    pub required_capabilities: Vec<ModelCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionResult {
    pub title: String,
    pub steps: Vec<StepDefinition>,
}
