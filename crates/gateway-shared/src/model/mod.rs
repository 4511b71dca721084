pub mod ancillary;
pub mod catalogue;
pub mod file;
pub mod llm_config;
pub mod message;
pub mod task;

pub use ancillary::{ApiKey, ChatMessage, ChatRole, ChatThread};
pub use catalogue::{Modality, ModelArchitecture, ModelDescription, ModelPricing};
pub use file::{AudioCodec, FileMetadata, FileModality};
pub use llm_config::{
    LlmConfig, PdfConfig, PdfEngine, ReasoningConfig, ReasoningEffort, WebSearchConfig,
    WebSearchContextSize,
};
pub use message::{AttachedFile, LlmMessage, Role, StreamedChunk};
pub use task::{
    Complexity, CostIncrement, DecompositionResult, ModelCapability, NormalStep, ReevaluateStep,
    StepDefinition, StepHeader, StepStatus, StepType, Task, TaskStatus, TaskStep,
};
