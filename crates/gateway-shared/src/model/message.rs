//! Conversation messages and attached files exchanged with the LLM adapter
//! (spec §4.2). Lives in `gateway-shared` rather than `gateway-llm` because
//! the pricing estimator (C4, in `gateway-catalogue`) needs these shapes
//! too, and `gateway-llm` itself depends on the catalogue for model lookups.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::catalogue::Modality;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// An attachment carried by a message. Bytes are base64-encoded on the wire
/// to the upstream provider; the adapter itself is agnostic to how the
/// caller sourced them (upload vs. registered URL), matching the split kept
/// by `FileMetadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttachedFile {
    Pdf { bytes: Option<Vec<u8>>, url: Option<String> },
    Image { bytes: Option<Vec<u8>>, url: Option<String> },
    Audio { bytes: Vec<u8> },
    Video { bytes: Option<Vec<u8>>, url: Option<String> },
    Text { content: String },
}

impl AttachedFile {
    pub fn modality(&self) -> Modality {
        match self {
            Self::Pdf { .. } => Modality::File,
            Self::Image { .. } => Modality::Image,
            Self::Audio { .. } => Modality::Audio,
            Self::Video { .. } => Modality::Video,
            Self::Text { .. } => Modality::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub files: Vec<AttachedFile>,
    /// Populated on assistant messages returned by the adapter.
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    #[serde(default)]
    pub additional_data: HashMap<String, String>,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            files: Vec::new(),
            prompt_tokens: None,
            completion_tokens: None,
            additional_data: HashMap::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            files: Vec::new(),
            prompt_tokens: None,
            completion_tokens: None,
            additional_data: HashMap::new(),
        }
    }

    pub fn user_with_files(content: impl Into<String>, files: Vec<AttachedFile>) -> Self {
        Self { files, ..Self::user(content) }
    }
}

/// A single piece of a streamed completion (spec §4.2, §4.11).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamedChunk {
    pub content: String,
    pub additional_data_key: Option<String>,
}

impl StreamedChunk {
    pub fn plain(content: impl Into<String>) -> Self {
        Self { content: content.into(), additional_data_key: None }
    }

    pub fn tagged(content: impl Into<String>, key: impl Into<String>) -> Self {
        Self { content: content.into(), additional_data_key: Some(key.into()) }
    }
}
