//! JSON shapes of the upstream chat-completions request/response. The
//! upstream is OpenRouter-shaped: a single `/chat/completions` endpoint,
//! bearer auth, OpenAI-compatible body with an `extra_body`-style top-level
//! `plugins`/`web_search_options`/`reasoning` extension.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebSearchPlugin {
    pub id: &'static str,
    pub engine: &'static str,
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebSearchOptions {
    pub search_context_size: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasoningOptions {
    pub effort: &'static str,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Vec<WebSearchPlugin>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_options: Option<WebSearchOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningOptions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReasoningDetail {
    #[serde(rename = "type")]
    pub detail_type: String,
    pub text: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResponseMessage {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    #[serde(default)]
    pub reasoning_details: Vec<ReasoningDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StreamDelta {
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_details: Vec<ReasoningDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    pub delta: StreamDelta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamEvent {
    pub choices: Vec<StreamChoice>,
}

/// Parses a single SSE `data:` payload from the upstream stream. Returns
/// `None` for the `[DONE]` sentinel or malformed lines (logged by the
/// caller, not propagated - a stray keep-alive frame must not kill the
/// stream).
pub fn parse_stream_event(data: &str) -> Option<StreamEvent> {
    if data.trim() == "[DONE]" {
        return None;
    }
    serde_json::from_str(data).ok()
}
