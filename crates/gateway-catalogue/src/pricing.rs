//! Pricing estimator (spec §4.4). `actual_cost` bills what was actually
//! consumed, reading token counts off the returned assistant message;
//! `estimate_cost` predicts a cost up front from a prompt-token guess and a
//! predicted completion length, before the call has happened.

use gateway_shared::model::{
    AttachedFile, AudioCodec, FileMetadata, FileModality, LlmConfig, LlmMessage, ModelDescription,
    PdfEngine, WebSearchContextSize,
};

/// Fallback byte rate for an audio file with no recorded codec (e.g. an
/// older row from before codec tracking was added).
const DEFAULT_AUDIO_BYTES_PER_SECOND: f64 = AudioCodec::Mp3.bytes_per_second();
const AUDIO_TOKENS_PER_SECOND: f64 = 75.0;

/// Tokens estimated per KB of plain text, used for attached text files and
/// for PDF engines that extract text rather than tokenize page images.
const TOKENS_PER_KB_TEXT: f64 = 220.0;
/// Token-equivalent cost per PDF page, by extraction engine.
fn pdf_tokens_per_page(engine: PdfEngine) -> f64 {
    match engine {
        PdfEngine::Native => 1_100.0,
        PdfEngine::MistralOcr => 900.0,
        PdfEngine::PdfText => 650.0,
    }
}

fn request_and_image_fees(pricing: &gateway_shared::model::ModelPricing, image_count: usize) -> f64 {
    let request_fee = pricing.request.unwrap_or(0.0);
    let image_fee = pricing.image.unwrap_or(0.0) * image_count as f64;
    request_fee + image_fee
}

fn audio_cost(pricing: &gateway_shared::model::ModelPricing, byte_size: u64, codec: Option<AudioCodec>) -> f64 {
    let Some(per_million) = pricing.audio_per_million else { return 0.0 };
    let bytes_per_second = codec.map_or(DEFAULT_AUDIO_BYTES_PER_SECOND, AudioCodec::bytes_per_second);
    let seconds = byte_size as f64 / bytes_per_second;
    let tokens = seconds * AUDIO_TOKENS_PER_SECOND;
    tokens * per_million / 1_000_000.0
}

/// Cost of what actually happened: billed strictly off the token counts the
/// upstream reported, plus flat per-request/per-image fees and audio, which
/// are never folded into `prompt_tokens`.
pub fn actual_cost(model: &ModelDescription, assistant: &LlmMessage, attached_files: &[FileMetadata]) -> f64 {
    let prompt_tokens = assistant.prompt_tokens.unwrap_or(0) as f64;
    let completion_tokens = assistant.completion_tokens.unwrap_or(0) as f64;
    let pricing = &model.pricing;

    let mut cost = prompt_tokens * pricing.prompt_per_million / 1_000_000.0
        + completion_tokens * pricing.completion_per_million / 1_000_000.0;

    let image_count = attached_files.iter().filter(|f| f.modality == FileModality::Image).count();
    cost += request_and_image_fees(pricing, image_count);

    for file in attached_files {
        if file.modality == FileModality::Audio {
            cost += audio_cost(pricing, file.byte_size, file.codec);
        }
    }

    cost
}

/// Cost predicted before the call, from an estimated prompt token count and
/// a model-predicted completion length. Unlike `actual_cost`, this includes
/// token-equivalent costs for attached text/PDF content (since those tokens
/// haven't been counted by the upstream yet) plus reasoning and web-search
/// surcharges driven by the request config.
pub fn estimate_cost(
    model: &ModelDescription,
    prompt_tokens: f64,
    predicted_completion_tokens: f64,
    attached_files: &[FileMetadata],
    config: &LlmConfig,
) -> f64 {
    let pricing = &model.pricing;
    let mut cost = prompt_tokens * pricing.prompt_per_million / 1_000_000.0
        + predicted_completion_tokens * pricing.completion_per_million / 1_000_000.0;

    let image_count = attached_files.iter().filter(|f| f.modality == FileModality::Image).count();
    cost += request_and_image_fees(pricing, image_count);

    for file in attached_files {
        match file.modality {
            FileModality::Audio => cost += audio_cost(pricing, file.byte_size, file.codec),
            FileModality::Text => {
                let kb = file.byte_size as f64 / 1024.0;
                let tokens = kb * TOKENS_PER_KB_TEXT;
                cost += tokens * pricing.prompt_per_million / 1_000_000.0;
            }
            FileModality::Pdf => {
                let pages = file.page_count.unwrap_or(1) as f64;
                let tokens = pages * pdf_tokens_per_page(config.pdf.engine);
                cost += tokens * pricing.prompt_per_million / 1_000_000.0;
            }
            FileModality::Image | FileModality::Video => {}
        }
    }

    if config.reasoning.is_enabled() {
        let multiplier = config.reasoning.effort.cost_multiplier();
        let reasoning_tokens = multiplier * predicted_completion_tokens;
        cost += reasoning_tokens * pricing.completion_per_million / 1_000_000.0;
    }

    if config.web_search.is_enabled() {
        if config.web_search.use_exa {
            if let Some(exa_price) = pricing.exa_search_per_1000 {
                cost += config.web_search.max_results as f64 / 1000.0 * exa_price;
            }
        }
        if config.web_search.use_native {
            if let Some(native_price) = pricing.native_search_per_1000 {
                let size = config.web_search.context_size.unwrap_or(WebSearchContextSize::Medium);
                cost += config.web_search.max_results as f64 * size.cost_multiplier() / 1000.0 * native_price;
            }
        }
    }

    cost
}

/// `required_file_ids` plus prompt length are the only inputs available to
/// the selector before a model is chosen; this approximates token count the
/// way the step executor does when calling C4 ahead of a completion.
pub fn approximate_prompt_tokens(prompt: &str) -> f64 {
    prompt.len() as f64 / 4.0
}

/// Translates attached-file descriptors into the adapter's message-level
/// file representation, used right before a C2 call.
pub fn to_attached_file(meta: &FileMetadata) -> AttachedFile {
    match meta.modality {
        FileModality::Pdf => AttachedFile::Pdf { bytes: None, url: meta.remote_url.clone() },
        FileModality::Image => AttachedFile::Image { bytes: None, url: meta.remote_url.clone() },
        FileModality::Audio => AttachedFile::Audio { bytes: Vec::new() },
        FileModality::Video => AttachedFile::Video { bytes: None, url: meta.remote_url.clone() },
        FileModality::Text => AttachedFile::Text { content: String::new() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_shared::model::{ModelArchitecture, ModelPricing};

    fn priced_model() -> ModelDescription {
        ModelDescription {
            id: "m".to_string(),
            provider: "p".to_string(),
            context_length: 100_000,
            pricing: ModelPricing {
                prompt_per_million: 1_000_000.0,
                completion_per_million: 2_000_000.0,
                request: Some(0.01),
                image: Some(0.02),
                audio_per_million: None,
                exa_search_per_1000: Some(4.0),
                native_search_per_1000: Some(10.0),
            },
            architecture: ModelArchitecture::default(),
            supports_reasoning: true,
            supports_native_web_search: false,
            supports_structured_outputs: true,
        }
    }

    #[test]
    fn actual_cost_bills_tokens_and_request_fee() {
        let model = priced_model();
        let assistant = LlmMessage {
            prompt_tokens: Some(10),
            completion_tokens: Some(5),
            ..LlmMessage::user("x")
        };
        let cost = actual_cost(&model, &assistant, &[]);
        // 10 * 1.0 + 5 * 2.0 + 0.01 request fee
        assert!((cost - (10.0 + 10.0 + 0.01)).abs() < 1e-9);
    }

    #[test]
    fn estimate_cost_adds_reasoning_surcharge() {
        let model = priced_model();
        let config = LlmConfig {
            reasoning: gateway_shared::model::ReasoningConfig {
                effort: gateway_shared::model::ReasoningEffort::Medium,
            },
            ..Default::default()
        };
        let without_reasoning = estimate_cost(&model, 100.0, 50.0, &[], &LlmConfig::default());
        let with_reasoning = estimate_cost(&model, 100.0, 50.0, &[], &config);
        assert!(with_reasoning > without_reasoning);
    }

    fn audio_file(codec: Option<gateway_shared::model::AudioCodec>) -> FileMetadata {
        FileMetadata {
            id: uuid::Uuid::new_v4(),
            owner_id: uuid::Uuid::new_v4(),
            modality: FileModality::Audio,
            byte_size: 1_000_000,
            page_count: None,
            codec,
            remote_url: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn wav_audio_costs_more_per_byte_than_mp3() {
        let mut model = priced_model();
        model.pricing.audio_per_million = Some(1_000_000.0);

        let wav_cost = estimate_cost(
            &model,
            0.0,
            0.0,
            &[audio_file(Some(gateway_shared::model::AudioCodec::Wav))],
            &LlmConfig::default(),
        );
        let mp3_cost = estimate_cost(
            &model,
            0.0,
            0.0,
            &[audio_file(Some(gateway_shared::model::AudioCodec::Mp3))],
            &LlmConfig::default(),
        );

        // the same byte size implies fewer seconds of wav audio than mp3
        // (wav is uncompressed), so its token-equivalent cost is lower.
        assert!(wav_cost < mp3_cost);
    }

    #[test]
    fn missing_codec_falls_back_to_a_default_rate() {
        let mut model = priced_model();
        model.pricing.audio_per_million = Some(1_000_000.0);

        let no_codec = estimate_cost(&model, 0.0, 0.0, &[audio_file(None)], &LlmConfig::default());
        let mp3 = estimate_cost(
            &model,
            0.0,
            0.0,
            &[audio_file(Some(gateway_shared::model::AudioCodec::Mp3))],
            &LlmConfig::default(),
        );
        assert!((no_codec - mp3).abs() < 1e-9);
    }
}
