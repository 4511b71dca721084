//! The LLM adapter (C2): a single upstream provider reached over `reqwest`,
//! both buffered (`complete`) and SSE-framed (`stream`).

use std::collections::BTreeMap;
use std::sync::Arc;

use gateway_catalogue::ModelCatalogue;
use gateway_shared::model::{
    LlmConfig, LlmMessage, ModelDescription, Role, StreamedChunk, WebSearchContextSize,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::error::AdapterError;
use crate::parser::{parse_additional_data, StreamParser};
use crate::prompts::build_system_message;
use crate::wire::{
    CompletionRequest, CompletionResponse, ReasoningOptions, WebSearchOptions, WebSearchPlugin,
    WireMessage,
};

/// Reasoning output is delivered as synthesized additional-data chunks
/// under these fixed keys; callers may never request them explicitly
/// (spec §4.2, §9 design note on reserved reasoning keys).
pub const INTERNAL_REASONING_KEY: &str = "_internal_reasoning";
pub const INTERNAL_REASONING_SUMMARY_KEY: &str = "_internal_reasoning_summary";

const STREAM_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct LlmAdapter {
    catalogue: Arc<ModelCatalogue>,
    client: reqwest::Client,
    base_url: String,
}

impl LlmAdapter {
    pub fn new(catalogue: Arc<ModelCatalogue>, base_url: impl Into<String>) -> Self {
        Self { catalogue, client: reqwest::Client::new(), base_url: base_url.into() }
    }

    async fn prepare(
        &self,
        model: &str,
        messages: &[LlmMessage],
        additional_requested_data: &BTreeMap<String, String>,
    ) -> Result<ModelDescription, AdapterError> {
        validate_reserved_keys(additional_requested_data)?;
        let model_desc = self
            .catalogue
            .get_by_id(model)
            .await
            .map_err(|_| AdapterError::ModelNotFound(model.to_string()))?
            .ok_or_else(|| AdapterError::ModelNotFound(model.to_string()))?;
        validate_supported_inputs(messages, &model_desc)?;
        Ok(model_desc)
    }

    fn build_request(
        &self,
        model: &str,
        messages: &[LlmMessage],
        additional_requested_data: &BTreeMap<String, String>,
        temperature: f32,
        config: &LlmConfig,
        model_desc: &ModelDescription,
        stream: bool,
    ) -> CompletionRequest {
        let mut wire_messages =
            vec![WireMessage { role: "system", content: build_system_message(additional_requested_data) }];
        wire_messages.extend(messages.iter().map(to_wire_message));

        let (plugins, web_search_options) = build_web_search(&config.web_search, model_desc.supports_native_web_search);
        let reasoning =
            if config.reasoning.is_enabled() && model_desc.supports_reasoning {
                Some(ReasoningOptions { effort: reasoning_effort_str(config.reasoning.effort) })
            } else {
                None
            };

        CompletionRequest {
            model: model.to_string(),
            messages: wire_messages,
            temperature,
            stream: if stream { Some(true) } else { None },
            plugins,
            web_search_options,
            reasoning,
        }
    }

    /// Non-streaming completion (spec §4.2).
    pub async fn complete(
        &self,
        api_key: &str,
        model: &str,
        messages: &[LlmMessage],
        additional_requested_data: &BTreeMap<String, String>,
        temperature: f32,
        config: &LlmConfig,
    ) -> Result<LlmMessage, AdapterError> {
        let model_desc = self.prepare(model, messages, additional_requested_data).await?;
        let request =
            self.build_request(model, messages, additional_requested_data, temperature, config, &model_desc, false);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::UpstreamStatus(format!("{status}: {body}")));
        }

        let parsed: CompletionResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::UpstreamStatus("no choices in response".to_string()))?;

        let raw_content = choice.message.content.unwrap_or_default();
        let (cleaned_content, mut additional_data) = parse_additional_data(&raw_content);

        if let Some(reasoning) = choice.message.reasoning {
            additional_data.insert(INTERNAL_REASONING_KEY.to_string(), reasoning);
        }
        let (texts, summaries) = split_reasoning_details(&choice.message.reasoning_details);
        if !texts.is_empty() {
            let joined = texts.join("\n");
            additional_data
                .entry(INTERNAL_REASONING_KEY.to_string())
                .and_modify(|existing| {
                    existing.push('\n');
                    existing.push_str(&joined);
                })
                .or_insert(joined);
        }
        if !summaries.is_empty() {
            additional_data.insert(INTERNAL_REASONING_SUMMARY_KEY.to_string(), summaries.join("\n"));
        }

        Ok(LlmMessage {
            role: Role::Assistant,
            content: cleaned_content,
            files: Vec::new(),
            prompt_tokens: parsed.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: parsed.usage.as_ref().map(|u| u.completion_tokens),
            additional_data,
        })
    }

    /// Streaming completion (spec §4.2): returns a stream of `StreamedChunk`
    /// fed by a background task that drains the upstream SSE body.
    pub async fn stream(
        &self,
        api_key: &str,
        model: &str,
        messages: &[LlmMessage],
        additional_requested_data: &BTreeMap<String, String>,
        temperature: f32,
        config: &LlmConfig,
    ) -> Result<ReceiverStream<Result<StreamedChunk, AdapterError>>, AdapterError> {
        let model_desc = self.prepare(model, messages, additional_requested_data).await?;
        let request =
            self.build_request(model, messages, additional_requested_data, temperature, config, &model_desc, true);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::UpstreamStatus(format!("{status}: {body}")));
        }

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(drain_sse_body(response, tx));
        Ok(ReceiverStream::new(rx))
    }
}

async fn drain_sse_body(
    response: reqwest::Response,
    tx: mpsc::Sender<Result<StreamedChunk, AdapterError>>,
) {
    let mut byte_stream = response.bytes_stream();
    let mut line_buffer = String::new();
    let mut parser = StreamParser::new();

    while let Some(next) = byte_stream.next().await {
        let bytes = match next {
            Ok(b) => b,
            Err(e) => {
                let _ = tx.send(Err(AdapterError::Transport(e))).await;
                return;
            }
        };
        line_buffer.push_str(&String::from_utf8_lossy(&bytes));

        while let Some(newline_pos) = line_buffer.find('\n') {
            let line = line_buffer[..newline_pos].trim_end_matches('\r').to_string();
            line_buffer.drain(..=newline_pos);

            let Some(data) = line.strip_prefix("data:") else { continue };
            let Some(event) = crate::wire::parse_stream_event(data.trim()) else { continue };
            let Some(choice) = event.choices.into_iter().next() else { continue };

            for detail in &choice.delta.reasoning_details {
                if let Some(text) = &detail.text {
                    if detail.detail_type == "reasoning.text" {
                        let chunk = StreamedChunk::tagged(text.clone(), INTERNAL_REASONING_KEY);
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                }
                if let Some(summary) = &detail.summary {
                    if detail.detail_type == "reasoning.summary" {
                        let chunk = StreamedChunk::tagged(summary.clone(), INTERNAL_REASONING_SUMMARY_KEY);
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                }
            }

            if let Some(content) = choice.delta.content {
                for chunk in parser.push(&content) {
                    if tx.send(Ok(chunk)).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    if let Some(tail) = parser.finish() {
        let _ = tx.send(Ok(tail)).await;
    }
}

fn validate_reserved_keys(additional_requested_data: &BTreeMap<String, String>) -> Result<(), AdapterError> {
    if additional_requested_data.contains_key(INTERNAL_REASONING_KEY) {
        return Err(AdapterError::ReservedKey(INTERNAL_REASONING_KEY.to_string()));
    }
    if additional_requested_data.contains_key(INTERNAL_REASONING_SUMMARY_KEY) {
        return Err(AdapterError::ReservedKey(INTERNAL_REASONING_SUMMARY_KEY.to_string()));
    }
    Ok(())
}

fn validate_supported_inputs(messages: &[LlmMessage], model: &ModelDescription) -> Result<(), AdapterError> {
    for message in messages {
        for file in &message.files {
            let modality = file.modality();
            if !model.architecture.input_modalities.contains(&modality) {
                return Err(AdapterError::UnsupportedInput(format!(
                    "model '{}' does not support {modality:?} input",
                    model.id
                )));
            }
        }
    }
    Ok(())
}

fn build_web_search(
    config: &gateway_shared::model::WebSearchConfig,
    model_supports_native: bool,
) -> (Option<Vec<WebSearchPlugin>>, Option<WebSearchOptions>) {
    if !config.is_enabled() {
        return (None, None);
    }

    let mut use_exa = config.use_exa;
    let use_native = config.use_native && model_supports_native;
    if config.use_native && !model_supports_native {
        use_exa = true;
    }

    let plugins = use_exa.then(|| {
        vec![WebSearchPlugin {
            id: "web",
            engine: "exa",
            max_results: config.max_results,
            search_prompt: config.search_prompt.clone(),
        }]
    });
    let web_search_options = use_native.then(|| WebSearchOptions {
        search_context_size: context_size_str(config.context_size.unwrap_or(WebSearchContextSize::Medium)),
    });

    (plugins, web_search_options)
}

fn context_size_str(size: WebSearchContextSize) -> &'static str {
    match size {
        WebSearchContextSize::Low => "low",
        WebSearchContextSize::Medium => "medium",
        WebSearchContextSize::High => "high",
    }
}

fn reasoning_effort_str(effort: gateway_shared::model::ReasoningEffort) -> &'static str {
    use gateway_shared::model::ReasoningEffort::*;
    match effort {
        None => "none",
        Minimal => "minimal",
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

fn split_reasoning_details(details: &[crate::wire::ReasoningDetail]) -> (Vec<String>, Vec<String>) {
    let mut texts = Vec::new();
    let mut summaries = Vec::new();
    for detail in details {
        if detail.detail_type == "reasoning.text" {
            if let Some(text) = &detail.text {
                texts.push(text.clone());
            }
        } else if detail.detail_type == "reasoning.summary" {
            if let Some(summary) = &detail.summary {
                summaries.push(summary.clone());
            }
        }
    }
    (texts, summaries)
}

fn to_wire_message(message: &LlmMessage) -> WireMessage {
    WireMessage { role: role_str(message.role), content: message.content.clone() }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_reserved_keys() {
        let mut requested = BTreeMap::new();
        requested.insert(INTERNAL_REASONING_KEY.to_string(), "x".to_string());
        assert!(validate_reserved_keys(&requested).is_err());
    }

    #[test]
    fn accepts_ordinary_keys() {
        let mut requested = BTreeMap::new();
        requested.insert("output".to_string(), "the result".to_string());
        assert!(validate_reserved_keys(&requested).is_ok());
    }
}
