//! Sub-agent tool surface: exactly `use_skill` and
//! `request_help`. `use_skill`'s `skill` parameter is enum-restricted to the
//! currently granted skill set — the LLM-observable half of the "double
//! gate" (the handler-side set-membership re-check is the other half, in
//! `run.rs`). Rebuilt whenever the grant set changes, since a `resume` that
//! adds skills must widen the enum before the loop continues.

use conductor_core::message::ToolDefinition;
use serde_json::json;

pub fn use_skill_def(granted_skills: &[String]) -> ToolDefinition {
    ToolDefinition {
        name: "use_skill".to_string(),
        description: "Invoke one of your currently granted skills.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "skill": { "type": "string", "enum": granted_skills },
                "arguments": { "type": "object" }
            },
            "required": ["skill", "arguments"]
        }),
    }
}

pub fn request_help_def() -> ToolDefinition {
    ToolDefinition {
        name: "request_help".to_string(),
        description: "Pause and ask the orchestrator for guidance, additional skills, or context."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "reason": { "type": "string" },
                "partial_results": { "type": "string" }
            },
            "required": ["reason"]
        }),
    }
}

/// The full two-tool surface for the given grant set, sorted so the enum (and
/// therefore the prompt-cache key) is stable regardless of grant order.
pub fn tool_surface(granted_skills: &[String]) -> Vec<ToolDefinition> {
    let mut sorted = granted_skills.to_vec();
    sorted.sort();
    vec![use_skill_def(&sorted), request_help_def()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_contains_exactly_two_tools() {
        let defs = tool_surface(&["calendar.list".to_string(), "calendar.create".to_string()]);
        assert_eq!(defs.len(), 2);
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["use_skill", "request_help"]);
    }

    #[test]
    fn use_skill_enum_is_sorted() {
        let def = use_skill_def(&["b.x".to_string(), "a.y".to_string()]);
        let enum_values = def.parameters["properties"]["skill"]["enum"].clone();
        assert_eq!(enum_values, json!(["a.y", "b.x"]));
    }
}
