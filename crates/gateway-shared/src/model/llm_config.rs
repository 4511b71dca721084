//! Per-call adapter configuration (spec §4.2), shared between `gateway-llm`
//! (which consumes it to build upstream requests) and `gateway-catalogue`'s
//! pricing estimator (which reads it to derive surcharges).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebSearchContextSize {
    Low,
    Medium,
    High,
}

impl WebSearchContextSize {
    /// Multiplier applied to `max_results` when estimating native web-search
    /// cost (spec §4.4).
    pub fn cost_multiplier(self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 2.0,
            Self::High => 4.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default)]
    pub use_exa: bool,
    #[serde(default)]
    pub use_native: bool,
    #[serde(default)]
    pub max_results: u32,
    pub context_size: Option<WebSearchContextSize>,
    pub search_prompt: Option<String>,
}

impl WebSearchConfig {
    pub fn is_enabled(&self) -> bool {
        self.use_exa || self.use_native
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    None,
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// Multiplier applied to completion tokens when estimating reasoning
    /// cost (spec §4.4).
    pub fn cost_multiplier(self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Minimal => 0.5,
            Self::Low => 1.0,
            Self::Medium => 2.0,
            Self::High => 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    pub effort: ReasoningEffort,
}

impl ReasoningConfig {
    pub fn is_enabled(&self) -> bool {
        !matches!(self.effort, ReasoningEffort::None)
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self { effort: ReasoningEffort::None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfEngine {
    Native,
    MistralOcr,
    PdfText,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    pub engine: PdfEngine,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self { engine: PdfEngine::PdfText }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
}
