//! Client for the external Scoring Service (spec §4.5 step 5).
//!
//! Enum dispatch over the two concrete backends, matching the convention
//! already used for `gateway_catalogue::ModelSourceKind`.

use gateway_shared::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A candidate model's predicted quality and completion length for one
/// prompt, as reported by the scoring service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub score: f64,
    pub predicted_length: i64,
}

#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    candidates: &'a [String],
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ScoreResponseEntry {
    model_id: String,
    score: f64,
    predicted_length: i64,
}

#[derive(Debug, Clone)]
pub enum ScoringClientKind {
    Http { client: reqwest::Client, base_url: String },
    /// Fixed scores, for tests and local development.
    Fixed(HashMap<String, ScoredCandidate>),
}

impl ScoringClientKind {
    pub fn http(base_url: impl Into<String>) -> Self {
        Self::Http { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    /// Scores `candidates` against `prompt`. A transport or protocol failure
    /// surfaces as `ModelScoringUnavailable`, which the executor escalates
    /// into task failure (spec §7) rather than retrying.
    pub async fn score(
        &self,
        candidates: &[String],
        prompt: &str,
    ) -> GatewayResult<HashMap<String, ScoredCandidate>> {
        match self {
            Self::Http { client, base_url } => {
                let response = client
                    .post(format!("{base_url}/score"))
                    .json(&ScoreRequest { candidates, prompt })
                    .send()
                    .await
                    .map_err(|e| GatewayError::ModelScoringUnavailable(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(GatewayError::ModelScoringUnavailable(format!(
                        "scoring service returned {}",
                        response.status()
                    )));
                }

                let entries: Vec<ScoreResponseEntry> = response
                    .json()
                    .await
                    .map_err(|e| GatewayError::ModelScoringUnavailable(e.to_string()))?;

                Ok(entries
                    .into_iter()
                    .map(|e| (e.model_id, ScoredCandidate { score: e.score, predicted_length: e.predicted_length }))
                    .collect())
            }
            Self::Fixed(scores) => Ok(candidates
                .iter()
                .filter_map(|id| scores.get(id).map(|s| (id.clone(), *s)))
                .collect()),
        }
    }
}
