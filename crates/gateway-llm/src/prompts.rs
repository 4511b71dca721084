//! Fixed instruction text prepended to every completion request so the
//! model knows how to emit additional-data segments (spec §4.2).

use std::collections::BTreeMap;

pub const BASE_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

const ADDITIONAL_DATA_INSTRUCTIONS_HEADER: &str = "\n\nWhen responding, you may include additional structured data using the following format:\n<additional_data key=[NAME]>[VALUE]</additional_data>\n[KEY] should be substituted by the name of additional data field (without square brackets).\nExample:\n\t<additional_data key=conversation_title>Counting 'R's in 'strawberry'</additional_data>\nOnly include additional data that was requested in this prompt.\nAll additional data fields should be included in the response, unless otherwise specified by their description.\nAll additional data values should be plain text, unless otherwise specified.\nAll additional data specified should have non-empty value (if it is included in the response). This is very important.\n\nAdditional data requested:\n";

/// Builds the full system message for a call, appending the additional-data
/// instructions (with each requested key's description) when any are
/// requested. Keys are iterated in sorted order for a deterministic prompt.
pub fn build_system_message(additional_requested_data: &BTreeMap<String, String>) -> String {
    if additional_requested_data.is_empty() {
        return BASE_SYSTEM_MESSAGE.to_string();
    }
    let mut message = String::from(BASE_SYSTEM_MESSAGE);
    message.push_str(ADDITIONAL_DATA_INSTRUCTIONS_HEADER);
    for (key, description) in additional_requested_data {
        message.push_str(key);
        message.push_str(": ");
        message.push_str(description);
        message.push('\n');
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_instructions_when_nothing_requested() {
        assert_eq!(build_system_message(&BTreeMap::new()), BASE_SYSTEM_MESSAGE);
    }

    #[test]
    fn appends_requested_keys() {
        let mut requested = BTreeMap::new();
        requested.insert("output".to_string(), "the step's result".to_string());
        let message = build_system_message(&requested);
        assert!(message.contains("output: the step's result"));
        assert!(message.starts_with(BASE_SYSTEM_MESSAGE));
    }
}
