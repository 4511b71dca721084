//! Strict parsing of the `steps` (and, for decomposition, `title`)
//! additional-data fields shared by C7 and C9: both ask the LLM for the
//! same JSON step-array shape, just with a different surrounding prompt.

use gateway_shared::model::{Complexity, ModelCapability, StepDefinition, StepType};
use gateway_shared::{GatewayError, GatewayResult};
use serde::Deserialize;

const UNTITLED: &str = "[Untitled]";

#[derive(Debug, Deserialize)]
struct RawStep {
    prompt: Option<String>,
    step_type: Option<String>,
    complexity: Option<String>,
    #[serde(default)]
    required_capabilities: Vec<String>,
}

fn parse_step_type(raw: Option<&str>) -> GatewayResult<StepType> {
    match raw.unwrap_or("normal") {
        "normal" => Ok(StepType::Normal),
        "reevaluate" => Ok(StepType::Reevaluate),
        other => Err(GatewayError::DecompositionError(format!("unknown step_type '{other}'"))),
    }
}

fn parse_complexity(raw: &str) -> GatewayResult<Complexity> {
    match raw {
        "low" => Ok(Complexity::Low),
        "medium" => Ok(Complexity::Medium),
        "high" => Ok(Complexity::High),
        other => Err(GatewayError::DecompositionError(format!("unknown complexity '{other}'"))),
    }
}

fn parse_capability(raw: &str) -> GatewayResult<ModelCapability> {
    match raw {
        "reasoning" => Ok(ModelCapability::Reasoning),
        "exa_search" => Ok(ModelCapability::ExaSearch),
        "native_web_search" => Ok(ModelCapability::NativeWebSearch),
        "ocr_pdf" => Ok(ModelCapability::OcrPdf),
        "text_pdf" => Ok(ModelCapability::TextPdf),
        "native_pdf" => Ok(ModelCapability::NativePdf),
        other => Err(GatewayError::DecompositionError(format!("unknown required capability '{other}'"))),
    }
}

fn parse_step(raw: RawStep) -> GatewayResult<StepDefinition> {
    let prompt = raw
        .prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| GatewayError::DecompositionError("step missing a prompt".to_string()))?;
    let step_type = parse_step_type(raw.step_type.as_deref())?;

    match step_type {
        StepType::Normal => {
            let complexity_raw = raw
                .complexity
                .ok_or_else(|| GatewayError::DecompositionError("normal step missing complexity".to_string()))?;
            let complexity = parse_complexity(&complexity_raw)?;
            let required_capabilities = raw
                .required_capabilities
                .iter()
                .map(|s| parse_capability(s))
                .collect::<GatewayResult<Vec<_>>>()?;
            Ok(StepDefinition { prompt, step_type, complexity: Some(complexity), required_capabilities })
        }
        StepType::Reevaluate => {
            Ok(StepDefinition { prompt, step_type, complexity: None, required_capabilities: Vec::new() })
        }
    }
}

/// Parses the `steps` additional-data field into an ordered list of step
/// definitions. Empty input, invalid JSON, and an empty array are all
/// rejected - a plan with zero steps can never make progress.
pub fn parse_steps(steps_json: Option<&str>) -> GatewayResult<Vec<StepDefinition>> {
    let raw = steps_json
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| GatewayError::DecompositionError("response did not include a steps field".to_string()))?;

    let raw_steps: Vec<RawStep> = serde_json::from_str(raw)
        .map_err(|e| GatewayError::DecompositionError(format!("steps field was not a valid JSON array: {e}")))?;

    if raw_steps.is_empty() {
        return Err(GatewayError::DecompositionError("steps array must not be empty".to_string()));
    }

    raw_steps.into_iter().map(parse_step).collect()
}

/// Falls back to `[Untitled]` for a missing or blank title, matching the
/// task-level default a decomposition failure would otherwise have to
/// invent from nothing.
pub fn parse_title(title: Option<&str>) -> String {
    title.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(UNTITLED).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_steps_array() {
        let err = parse_steps(Some("[]")).unwrap_err();
        assert!(matches!(err, GatewayError::DecompositionError(_)));
    }

    #[test]
    fn rejects_unknown_complexity() {
        let json = r#"[{"prompt": "do it", "complexity": "extreme"}]"#;
        let err = parse_steps(Some(json)).unwrap_err();
        assert!(matches!(err, GatewayError::DecompositionError(_)));
    }

    #[test]
    fn parses_mixed_normal_and_reevaluate_steps() {
        let json = r#"[
            {"prompt": "research", "complexity": "low", "required_capabilities": ["exa_search"]},
            {"prompt": "check in", "step_type": "reevaluate"}
        ]"#;
        let steps = parse_steps(Some(json)).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_type, StepType::Normal);
        assert_eq!(steps[1].step_type, StepType::Reevaluate);
    }

    #[test]
    fn blank_title_falls_back_to_untitled() {
        assert_eq!(parse_title(Some("  ")), "[Untitled]");
        assert_eq!(parse_title(None), "[Untitled]");
        assert_eq!(parse_title(Some("Trip plan")), "Trip plan");
    }
}
