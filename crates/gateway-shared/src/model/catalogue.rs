//! Model catalogue types (spec §3, §4.3).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Image,
    File,
    Audio,
    Video,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelPricing {
    pub prompt_per_million: f64,
    pub completion_per_million: f64,
    pub request: Option<f64>,
    pub image: Option<f64>,
    pub audio_per_million: Option<f64>,
    pub exa_search_per_1000: Option<f64>,
    pub native_search_per_1000: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelArchitecture {
    pub input_modalities: HashSet<Modality>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescription {
    pub id: String,
    pub provider: String,
    pub context_length: i64,
    pub pricing: ModelPricing,
    pub architecture: ModelArchitecture,
    pub supports_reasoning: bool,
    pub supports_native_web_search: bool,
    pub supports_structured_outputs: bool,
}
