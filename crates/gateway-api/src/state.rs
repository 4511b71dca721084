//! Shared application state, threaded through every handler via axum's
//! `State` extractor.

use std::sync::Arc;

use gateway_orchestration::{OrchestrationContext, WorkQueue};
use gateway_store::{ApiKeyStore, ChatStore};

use crate::blob::BlobStoreKind;

#[derive(Clone)]
pub struct AppState {
    pub orchestration: OrchestrationContext,
    pub queue: WorkQueue,
    pub api_keys: Arc<ApiKeyStore>,
    pub chat: Arc<ChatStore>,
    pub blobs: Arc<BlobStoreKind>,
}
