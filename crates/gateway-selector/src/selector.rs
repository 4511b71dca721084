//! Model selection (C5, spec §4.5).

use gateway_catalogue::{pricing, ModelCatalogue};
use gateway_shared::model::{
    FileMetadata, LlmConfig, ModelCapability, ModelDescription, PdfEngine, ReasoningConfig,
    ReasoningEffort, WebSearchConfig,
};
use gateway_shared::{GatewayError, GatewayResult};

use crate::scoring::ScoringClientKind;

/// Small constant keeping the utility formula's denominator away from zero
/// without meaningfully biasing the ranking between real candidates (spec
/// §9 open question (a)).
const COST_EPSILON: f64 = 0.01;
/// Candidates whose normalized cost exceeds `3 * median + COST_EPSILON`, or
/// whose normalized score falls below this floor, are dropped before the
/// utility pick (spec §4.5 step 7).
const MIN_NORMALIZED_SCORE: f64 = -2.0;

#[derive(Debug, Clone)]
pub struct SelectedModel {
    pub model_id: String,
    pub score: f64,
    pub predicted_length: i64,
    pub estimated_cost: f64,
}

struct Evaluation {
    model: ModelDescription,
    score: f64,
    predicted_length: i64,
    cost: f64,
}

/// Selects the best model for a step. `required_file_ids` have already been
/// resolved by the caller into `attached_files`; `pdf_engine` and
/// `reasoning_effort` are derived by the caller from the step's capability
/// list (spec §4.8 step 5), since the selector doesn't own that mapping.
pub async fn select_model(
    catalogue: &ModelCatalogue,
    scoring: &ScoringClientKind,
    prompt: &str,
    required_capabilities: &[ModelCapability],
    attached_files: &[FileMetadata],
    pdf_engine: PdfEngine,
    reasoning_effort: ReasoningEffort,
) -> GatewayResult<SelectedModel> {
    let all_models = catalogue.get_all(None).await?;

    let required_modalities: Vec<_> = attached_files.iter().map(|f| f.modality.required_modality()).collect();
    let mut candidates: Vec<ModelDescription> = all_models
        .into_iter()
        .filter(|model| {
            required_modalities.iter().all(|m| model.architecture.input_modalities.contains(m))
        })
        .collect();

    for capability in required_capabilities {
        candidates = apply_capability_filter(candidates, *capability)?;
    }

    if candidates.is_empty() {
        return Err(GatewayError::NoSuitableModel(
            "no model satisfies the required modalities and capabilities".to_string(),
        ));
    }

    let candidate_ids: Vec<String> = candidates.iter().map(|m| m.id.clone()).collect();
    let scores = scoring.score(&candidate_ids, prompt).await?;

    let config = capability_config(required_capabilities, pdf_engine, reasoning_effort);
    let prompt_tokens = pricing::approximate_prompt_tokens(prompt);

    let mut evaluations = Vec::with_capacity(candidates.len());
    for model in candidates {
        let Some(scored) = scores.get(&model.id) else { continue };
        let cost = pricing::estimate_cost(
            &model,
            prompt_tokens,
            scored.predicted_length as f64,
            attached_files,
            &config,
        );
        evaluations.push(Evaluation {
            model,
            score: scored.score,
            predicted_length: scored.predicted_length,
            cost,
        });
    }

    if evaluations.is_empty() {
        return Err(GatewayError::ModelScoringUnavailable(
            "scoring service returned no usable candidates".to_string(),
        ));
    }

    pick_best(evaluations)
}

fn apply_capability_filter(
    models: Vec<ModelDescription>,
    capability: ModelCapability,
) -> GatewayResult<Vec<ModelDescription>> {
    Ok(match capability {
        ModelCapability::Reasoning => models.into_iter().filter(|m| m.supports_reasoning).collect(),
        ModelCapability::NativeWebSearch => {
            models.into_iter().filter(|m| m.supports_native_web_search).collect()
        }
        ModelCapability::NativePdf => models
            .into_iter()
            .filter(|m| m.architecture.input_modalities.contains(&gateway_shared::model::Modality::File))
            .collect(),
        ModelCapability::ExaSearch | ModelCapability::OcrPdf | ModelCapability::TextPdf => models,
    })
}

fn capability_config(
    required_capabilities: &[ModelCapability],
    pdf_engine: PdfEngine,
    reasoning_effort: ReasoningEffort,
) -> LlmConfig {
    let wants_reasoning = required_capabilities.contains(&ModelCapability::Reasoning);
    let wants_exa = required_capabilities.contains(&ModelCapability::ExaSearch);
    let wants_native = required_capabilities.contains(&ModelCapability::NativeWebSearch);

    LlmConfig {
        web_search: WebSearchConfig {
            use_exa: wants_exa,
            use_native: wants_native,
            max_results: if wants_exa || wants_native { 5 } else { 0 },
            context_size: None,
            search_prompt: None,
        },
        reasoning: ReasoningConfig { effort: if wants_reasoning { reasoning_effort } else { ReasoningEffort::None } },
        pdf: gateway_shared::model::PdfConfig { engine: pdf_engine },
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn z_scores(values: &[f64]) -> Vec<f64> {
    let m = mean(values);
    let sd = std_dev(values, m);
    if sd == 0.0 {
        return values.iter().map(|_| 0.0).collect();
    }
    values.iter().map(|v| (v - m) / sd).collect()
}

fn pick_best(evaluations: Vec<Evaluation>) -> GatewayResult<SelectedModel> {
    let scores: Vec<f64> = evaluations.iter().map(|e| e.score).collect();
    let costs: Vec<f64> = evaluations.iter().map(|e| e.cost).collect();

    let normalized_scores = z_scores(&scores);
    let normalized_costs = z_scores(&costs);
    let median_cost = median(&normalized_costs);
    let cost_ceiling = 3.0 * median_cost + COST_EPSILON;

    let mut best: Option<(f64, &Evaluation)> = None;
    for (i, eval) in evaluations.iter().enumerate() {
        if normalized_costs[i] > cost_ceiling || normalized_scores[i] < MIN_NORMALIZED_SCORE {
            continue;
        }
        let utility = eval.score / (eval.cost + COST_EPSILON).sqrt();
        if best.map(|(best_utility, _)| utility > best_utility).unwrap_or(true) {
            best = Some((utility, eval));
        }
    }

    let (_, winner) = best.ok_or_else(|| {
        GatewayError::NoSuitableModel("all scored candidates failed the normalization filters".to_string())
    })?;

    Ok(SelectedModel {
        model_id: winner.model.id.clone(),
        score: winner.score,
        predicted_length: winner.predicted_length,
        estimated_cost: winner.cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utility_prefers_higher_score_per_sqrt_cost() {
        let evaluations = vec![
            Evaluation {
                model: fake_model("expensive"),
                score: 2.0,
                predicted_length: 100,
                cost: 1.0,
            },
            Evaluation {
                model: fake_model("cheap"),
                score: 1.0,
                predicted_length: 100,
                cost: 0.25,
            },
        ];
        let winner = pick_best(evaluations).unwrap();
        assert_eq!(winner.model_id, "cheap");
    }

    fn fake_model(id: &str) -> ModelDescription {
        ModelDescription {
            id: id.to_string(),
            provider: "test".to_string(),
            context_length: 100_000,
            pricing: Default::default(),
            architecture: Default::default(),
            supports_reasoning: false,
            supports_native_web_search: false,
            supports_structured_outputs: true,
        }
    }

    #[test]
    fn capability_filter_drops_models_without_native_web_search() {
        let with_search = ModelDescription { supports_native_web_search: true, ..fake_model("a") };
        let without_search = fake_model("b");
        let filtered =
            apply_capability_filter(vec![with_search, without_search], ModelCapability::NativeWebSearch).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "a");
    }

    #[tokio::test]
    async fn never_returns_a_model_lacking_a_required_modality() {
        use crate::scoring::ScoredCandidate;
        use gateway_catalogue::ModelSourceKind;
        use gateway_shared::model::Modality;
        use std::collections::HashMap;
        use std::time::Duration;

        let text_only = fake_model("text-only");
        let mut image_capable = fake_model("image-capable");
        image_capable.architecture.input_modalities = std::collections::HashSet::from([Modality::Image]);

        let catalogue = ModelCatalogue::new(
            ModelSourceKind::Fixed(vec![text_only, image_capable]),
            Duration::from_secs(3600),
        );
        let scoring = ScoringClientKind::Fixed(HashMap::from([
            ("text-only".to_string(), ScoredCandidate { score: 10.0, predicted_length: 100 }),
            ("image-capable".to_string(), ScoredCandidate { score: 1.0, predicted_length: 100 }),
        ]));
        let attached = gateway_shared::model::FileMetadata {
            id: uuid::Uuid::new_v4(),
            owner_id: uuid::Uuid::new_v4(),
            modality: gateway_shared::model::FileModality::Image,
            byte_size: 1024,
            page_count: None,
            codec: None,
            remote_url: None,
            created_at: chrono::Utc::now(),
        };

        let selected = select_model(
            &catalogue,
            &scoring,
            "describe this picture",
            &[],
            &[attached],
            PdfEngine::PdfText,
            ReasoningEffort::None,
        )
        .await
        .unwrap();

        assert_eq!(selected.model_id, "image-capable");
    }
}
