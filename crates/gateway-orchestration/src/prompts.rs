//! System/user message text for decomposition (C7) and reevaluation (C9)
//! calls, and the per-step context block the executor (C8) builds from
//! completed siblings.

use gateway_shared::model::ModelCapability;

fn complexity_levels_text() -> &'static str {
    "\"low\", \"medium\", \"high\""
}

fn capabilities_text() -> &'static str {
    "\"reasoning\", \"exa_search\", \"native_web_search\", \"ocr_pdf\", \"text_pdf\", \"native_pdf\""
}

/// The user message for a fresh decomposition call (spec §4.7).
pub fn build_decomposition_prompt(user_prompt: &str) -> String {
    format!(
        "You are a task decomposition assistant. Your goal is to break down complex user tasks into a series of sequential steps that can be executed independently by different AI models.\n\n\
When decomposing a task, follow these guidelines:\n\
1. Break the task into clear, sequential steps\n\
2. Each step should be self-contained and actionable\n\
3. For each step, specify:\n\
   - A clear prompt that describes what needs to be done\n\
   - The step type: either \"normal\" for regular execution steps, or \"reevaluate\" for a reevaluation point where the plan can be adjusted based on results so far (optional, defaults to \"normal\")\n\
   - The complexity level: {complexity_levels}\n\
   - Required model capabilities (only specify if actually needed): {capabilities}\n\
4. The final step's output will be treated as the final output of the task, and will be shown to the user. This means that usually it's a good idea for the last step to summarize and combine all necessary information from previous steps.\n\n\
Important notes about step execution:\n\
- When a step is executed, all previous steps' prompts and outputs will be automatically provided to the model\n\
- Steps can naturally reference previous steps (e.g., \"use the information from step 3\", \"based on the previous analysis\")\n\
- Later steps can build upon earlier outputs without special syntax\n\n\
About reevaluation steps:\n\
- Use \"reevaluate\" step type when you want to pause and reassess the plan based on intermediate results\n\
- Reevaluation steps allow the system to generate new steps dynamically based on what has been learned\n\
- Reevaluation steps are quite common and useful, especially when the next actions depend heavily on results from previous steps, or the task involves exploring multiple approaches and choosing the best one\n\
- Don't put steps after a reevaluate step, as they will be replaced by the reevaluation anyway\n\
- Reevaluate steps only need a prompt - no complexity or capabilities\n\n\
Simple tasks:\n\
- If the task is simple and doesn't require multiple steps, return a single step representing the entire task\n\
- The prompt can either be the same as the user's request, or rephrased to be clearer and more actionable for an LLM\n\n\
Now, please decompose this task:\n{user_prompt}",
        complexity_levels = complexity_levels_text(),
        capabilities = capabilities_text(),
        user_prompt = user_prompt,
    )
}

pub const TASK_TITLE_DESCRIPTION: &str = "A concise title (3-8 words) that summarizes the task";

/// Additional-data description for the `steps` field, shared by
/// decomposition and reevaluation calls.
pub fn build_steps_description() -> String {
    format!(
        "JSON array of step objects. Each object must have:\n\
- \"prompt\": string describing the step task (can reference previous steps naturally, e.g. \"analyze the results from step 2\")\n\
- \"step_type\": string, either \"normal\" or \"reevaluate\" (optional, defaults to \"normal\" if not specified)\n\n\
For normal steps only:\n\
- \"complexity\": string, one of: {complexity_levels}\n\
- \"required_capabilities\": array of strings from: {capabilities} (only include capabilities that are actually needed; can be empty array if no special capabilities required)\n\n\
For reevaluate steps, only prompt and step_type are needed.\n\n\
Example: [{{\"prompt\": \"Research X\", \"step_type\": \"normal\", \"complexity\": \"low\", \"required_capabilities\": []}}, {{\"prompt\": \"Reevaluate next steps based on research\", \"step_type\": \"reevaluate\"}}]",
        complexity_levels = complexity_levels_text(),
        capabilities = capabilities_text(),
    )
}

/// Formats one already-completed sibling for the executor's context block
/// (spec §4.8 step 3).
pub fn format_previous_step(step_number: i32, prompt: &str, output: &str) -> String {
    format!("Step {step_number}: {prompt}\nOutput: {output}\n")
}

/// Formats an already-completed reevaluate sibling for the same context
/// block (spec §4.9 step 2).
pub fn format_reevaluate_step(step_number: i32, prompt: &str) -> String {
    format!("Step {step_number} (Reevaluate): {prompt}\n")
}

/// The executor's per-step prompt (spec §4.8 step 3).
pub fn build_step_context(title_or_prompt: &str, previous_steps: &str, step_number: i32, step_prompt: &str) -> String {
    format!(
        "Task: {title_or_prompt}\n\n\
{previous_steps}\
Current step (Step {step_number}):\n{step_prompt}"
    )
}

pub const TASK_STEP_OUTPUT_DESCRIPTION: &str = "Result of this step that can be used by subsequent steps, or shown to the user if this is the final step. Include all essential information, without referencing the rest of the response. The output should be independent of the rest of the response, and not reference it. It should not include information that is not necessary for the next step or the user (e.g. reasoning, excessive justifications, etc.).";

pub const TASK_STEP_FAILURE_REASON_DESCRIPTION: &str = "If the step could not be completed as requested, a concise description of why; leave empty if the step succeeded.";

/// The user message for a reevaluation call (spec §4.9 step 3).
pub fn build_reevaluation_prompt(original_prompt: &str, task_title: &str, previous_steps: &str) -> String {
    format!(
        "You are reevaluating a task's execution plan based on the results of previous steps.\n\n\
Original task prompt: {original_prompt}\n\
Task title: {task_title}\n\n\
{previous_steps}\n\
Based on the task, the title, and the results so far, generate a new sequence of steps to complete the remaining work.\n\
Follow these guidelines:\n\
1. Break the remaining work into clear, sequential steps\n\
2. Each step should be self-contained and actionable\n\
3. For each step, specify:\n\
   - A clear prompt that describes what needs to be done\n\
   - The step type: either \"normal\" for regular execution steps, or \"reevaluate\" for another reevaluation point (optional, defaults to \"normal\")\n\n\
For normal steps only:\n\
   - The complexity level: {complexity_levels}\n\
   - Required model capabilities (only specify if actually needed): {capabilities}\n\n\
For reevaluate steps, only prompt and step_type are needed.\n\n\
4. The final step's output will be treated as the final output of the task, and will be shown to the user\n\
5. Steps can naturally reference previous steps (e.g., \"use the information from step 3\", \"based on the previous analysis\")\n\n\
Note: If you include a \"reevaluate\" step, avoid putting additional steps after it, as they will be replaced by the reevaluation anyway.\n\n\
Generate the new steps to complete the task based on what has been accomplished so far.",
        complexity_levels = complexity_levels_text(),
        capabilities = capabilities_text(),
    )
}

pub fn capability_label(capability: ModelCapability) -> &'static str {
    match capability {
        ModelCapability::Reasoning => "reasoning",
        ModelCapability::ExaSearch => "exa_search",
        ModelCapability::NativeWebSearch => "native_web_search",
        ModelCapability::OcrPdf => "ocr_pdf",
        ModelCapability::TextPdf => "text_pdf",
        ModelCapability::NativePdf => "native_pdf",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decomposition_prompt_includes_user_text() {
        let prompt = build_decomposition_prompt("write a poem about cats");
        assert!(prompt.contains("write a poem about cats"));
        assert!(prompt.contains("reevaluate"));
    }

    #[test]
    fn step_context_places_previous_before_current() {
        let previous = format_previous_step(1, "research", "findings");
        let context = build_step_context("Trip plan", &previous, 2, "summarize");
        let previous_idx = context.find("Step 1").unwrap();
        let current_idx = context.find("Current step").unwrap();
        assert!(previous_idx < current_idx);
    }
}
