//! File metadata. Raw bytes live with an external blob-storage collaborator
//! (spec §1 non-goal); only enough is kept here to drive modality filtering
//! (C5) and size-based cost estimation (C4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalogue::Modality;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileModality {
    Pdf,
    Image,
    Audio,
    Video,
    Text,
}

impl FileModality {
    /// Input modalities a model must support to accept this file.
    pub fn required_modality(self) -> Modality {
        match self {
            Self::Pdf => Modality::File,
            Self::Image => Modality::Image,
            Self::Audio => Modality::Audio,
            Self::Video => Modality::Video,
            Self::Text => Modality::Text,
        }
    }
}

/// Source audio codec, set on audio files so the pricing estimator can pick
/// the right byte-to-duration rate instead of assuming one codec for all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    Wav,
    Mp3,
}

impl AudioCodec {
    /// Average bytes of source audio per second of playback.
    pub const fn bytes_per_second(self) -> f64 {
        match self {
            Self::Wav => 176_400.0,
            Self::Mp3 => 16_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub modality: FileModality,
    pub byte_size: u64,
    /// Set for PDFs; used by the estimator's page-count-based pricing.
    pub page_count: Option<u32>,
    /// Set for audio files; used by the estimator's codec-rate audio pricing.
    pub codec: Option<AudioCodec>,
    pub remote_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
