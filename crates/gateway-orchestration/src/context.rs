//! Collaborators shared by C7/C8/C9/C10, bundled into one struct rather
//! than threading five `Arc`s through every function signature.

use std::sync::Arc;

use gateway_catalogue::ModelCatalogue;
use gateway_llm::LlmAdapter;
use gateway_selector::ScoringClientKind;
use gateway_shared::event::EventBus;
use gateway_store::{FileStore, TaskStore};

#[derive(Clone)]
pub struct OrchestrationContext {
    pub store: Arc<TaskStore>,
    pub files: Arc<FileStore>,
    pub llm: Arc<LlmAdapter>,
    pub catalogue: Arc<ModelCatalogue>,
    pub scoring: Arc<ScoringClientKind>,
    pub events: Arc<EventBus>,
    pub decomposition_model: String,
}

impl OrchestrationContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<TaskStore>,
        files: Arc<FileStore>,
        llm: Arc<LlmAdapter>,
        catalogue: Arc<ModelCatalogue>,
        scoring: Arc<ScoringClientKind>,
        events: Arc<EventBus>,
        decomposition_model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            files,
            llm,
            catalogue,
            scoring,
            events,
            decomposition_model: decomposition_model.into(),
        }
    }
}
