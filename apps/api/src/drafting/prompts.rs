use crate::llm_client::prompts::{ACADEMIC_REGISTER, JSON_ONLY_SYSTEM};

/// System prompt for section drafting.
pub fn draft_system() -> String {
    format!(
        "You are an experienced author of student training reports. \
         You draft report sections from a training task description. {JSON_ONLY_SYSTEM}"
    )
}

/// Builds the drafting prompt. User text is interpolated once, so braces in a
/// task description are never mistaken for template slots.
pub fn build_draft_prompt(title: &str, description: &str, sections: &[String]) -> String {
    let listed = sections
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n");

    let schema: serde_json::Map<String, serde_json::Value> = sections
        .iter()
        .map(|s| (s.clone(), serde_json::Value::String("...".to_string())))
        .collect();
    let schema = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"Draft the sections of a training report for the task below.

TASK TITLE:
{title}

TASK DESCRIPTION:
{description}

SECTIONS TO WRITE (use these names verbatim as JSON keys):
{listed}

Return a JSON object with EXACTLY these keys and a string value for each:
{schema}

Rules:
- One key per section listed above, no extra keys.
- Each value is plain text. Separate paragraphs with a blank line. No markdown.
- {ACADEMIC_REGISTER}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_every_section() {
        let sections = vec!["goal".to_string(), "实训内容".to_string()];
        let prompt = build_draft_prompt("Network lab", "Configure VLANs", &sections);
        assert!(prompt.contains("- goal"));
        assert!(prompt.contains("- 实训内容"));
        assert!(prompt.contains("Configure VLANs"));
        assert!(prompt.contains("\"goal\""), "schema should show section keys");
    }

    #[test]
    fn test_system_prompt_demands_json() {
        assert!(draft_system().contains("valid JSON only"));
    }
}
