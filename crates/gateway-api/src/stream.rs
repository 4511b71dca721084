//! Completion Stream Service (C11, spec §4.11): wraps one C2 `stream` call
//! into the client-facing event sequence `completion.started` →
//! `completion.chunk`* → `completion.finished`.
//!
//! Built the same way C2's own `LlmAdapter::stream` drains an upstream SSE
//! body: a background task pushes frames into a bounded channel, the
//! handler hands the receiving half to axum as the response body.

use std::collections::BTreeMap;

use axum::response::sse::Event as SseEvent;
use gateway_orchestration::OrchestrationContext;
use gateway_shared::model::{LlmConfig, LlmMessage};
use gateway_shared::GatewayError;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

const COMPLETION_STREAM_CHANNEL_CAPACITY: usize = 64;

#[allow(clippy::too_many_arguments)]
pub fn completion_events(
    ctx: OrchestrationContext,
    api_key: String,
    model: String,
    messages: Vec<LlmMessage>,
    additional_requested_data: BTreeMap<String, String>,
    temperature: f32,
    config: LlmConfig,
) -> ReceiverStream<Result<SseEvent, axum::Error>> {
    let (tx, rx) = mpsc::channel(COMPLETION_STREAM_CHANNEL_CAPACITY);
    tokio::spawn(drive(ctx, api_key, model, messages, additional_requested_data, temperature, config, tx));
    ReceiverStream::new(rx)
}

#[allow(clippy::too_many_arguments)]
async fn drive(
    ctx: OrchestrationContext,
    api_key: String,
    model: String,
    messages: Vec<LlmMessage>,
    additional_requested_data: BTreeMap<String, String>,
    temperature: f32,
    config: LlmConfig,
    tx: mpsc::Sender<Result<SseEvent, axum::Error>>,
) {
    let completion_id = Uuid::new_v4();
    if tx.send(Ok(frame("completion.started", json!({"completion_id": completion_id})))).await.is_err() {
        return;
    }

    let mut chunks = match ctx
        .llm
        .stream(&api_key, &model, &messages, &additional_requested_data, temperature, &config)
        .await
    {
        Ok(s) => s,
        Err(e) => {
            let err: GatewayError = e.into();
            let _ = tx
                .send(Ok(frame(
                    "completion.finished",
                    json!({"completion_id": completion_id, "error": err.to_string()}),
                )))
                .await;
            return;
        }
    };

    while let Some(next) = chunks.next().await {
        let frame = match next {
            Ok(chunk) => frame(
                "completion.chunk",
                json!({
                    "completion_id": completion_id,
                    "content": chunk.content,
                    "additional_data_key": chunk.additional_data_key,
                }),
            ),
            Err(e) => {
                let err: GatewayError = e.into();
                let _ = tx
                    .send(Ok(frame(
                        "completion.finished",
                        json!({"completion_id": completion_id, "error": err.to_string()}),
                    )))
                    .await;
                return;
            }
        };
        if tx.send(Ok(frame)).await.is_err() {
            return;
        }
    }

    let _ = tx.send(Ok(frame("completion.finished", json!({"completion_id": completion_id})))).await;
}

fn frame(event_type: &str, content: serde_json::Value) -> SseEvent {
    let body = json!({
        "type": event_type,
        "content": content,
        "metadata": {},
        "event_id": Uuid::new_v4(),
    });
    SseEvent::default().data(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_catalogue::ModelCatalogue;
    use gateway_llm::LlmAdapter;
    use gateway_selector::ScoringClientKind;
    use gateway_shared::event::EventBus;
    use gateway_shared::model::{Modality, ModelArchitecture, ModelDescription, ModelPricing};
    use gateway_store::{FileStore, TaskStore};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn fixed_model() -> ModelDescription {
        ModelDescription {
            id: "test/model".to_string(),
            provider: "test".to_string(),
            context_length: 8192,
            pricing: ModelPricing::default(),
            architecture: ModelArchitecture { input_modalities: HashSet::from([Modality::Text]) },
            supports_reasoning: false,
            supports_native_web_search: false,
            supports_structured_outputs: true,
        }
    }

    async fn test_context(pool: sqlx::PgPool) -> OrchestrationContext {
        let catalogue = Arc::new(ModelCatalogue::new(
            gateway_catalogue::ModelSourceKind::Fixed(vec![fixed_model()]),
            std::time::Duration::from_secs(3600),
        ));
        OrchestrationContext::new(
            Arc::new(TaskStore::new(pool.clone())),
            Arc::new(FileStore::new(pool)),
            Arc::new(LlmAdapter::new(catalogue.clone(), "http://localhost:0".to_string())),
            catalogue,
            Arc::new(ScoringClientKind::Fixed(Default::default())),
            Arc::new(EventBus::new()),
            "test/model".to_string(),
        )
    }

    #[sqlx::test(migrator = "gateway_store::MIGRATOR")]
    async fn drive_emits_started_then_finished_on_adapter_error(pool: sqlx::PgPool) {
        let ctx = test_context(pool).await;
        let mut events =
            completion_events(ctx, "bad-key".to_string(), "test/model".to_string(), vec![], Default::default(), 0.7, LlmConfig::default());

        let started = events.next().await.unwrap().unwrap();
        assert!(format!("{started:?}").contains("completion.started"));

        let finished = events.next().await.unwrap().unwrap();
        assert!(format!("{finished:?}").contains("completion.finished"));
    }
}
