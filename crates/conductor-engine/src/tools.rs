//! Orchestrator tool surface and the local `get_skill` handler. `dispatch_agent`/`get_agent_results`/
//! `send_agent_update` are routed in `run.rs`; `get_skill` is small and
//! self-contained enough to live here as a pure function of the registry.

use conductor_core::message::ToolDefinition;
use conductor_core::skill::SkillRegistry;
use serde_json::json;

use crate::state::Mode;

pub fn get_skill_def() -> ToolDefinition {
    ToolDefinition {
        name: "get_skill".to_string(),
        description: "Look up a skill domain brief, a domain's index, one skill's full \
            documentation, or every skill in a domain. Omit `name` for a brief of every domain."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "domain, domain.action, or domain.all; omit for every domain's brief"
                }
            }
        }),
    }
}

pub fn dispatch_agent_def() -> ToolDefinition {
    ToolDefinition {
        name: "dispatch_agent".to_string(),
        description: "Dispatch a bounded sub-agent mission. Results arrive later via get_agent_results."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "agent_id": { "type": "string", "description": "unique within this turn" },
                "mission": { "type": "string" },
                "skills": { "type": "array", "items": { "type": "string" } },
                "depends_on": { "type": "array", "items": { "type": "string" } },
                "max_tool_calls": { "type": "integer" },
                "context_files": { "type": "array", "items": { "type": "string" } },
                "model_override": { "type": "string" },
                "context": { "type": "string" }
            },
            "required": ["agent_id", "mission", "skills"]
        }),
    }
}

pub fn get_agent_results_def() -> ToolDefinition {
    ToolDefinition {
        name: "get_agent_results".to_string(),
        description: "Check dispatched agents' statuses. mode=immediate (default) returns what \
            is currently known; wait_any/wait_all block (up to timeout_ms) until satisfied."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "agent_ids": { "type": "array", "items": { "type": "string" } },
                "mode": { "type": "string", "enum": ["immediate", "wait_any", "wait_all"] },
                "timeout_ms": { "type": "integer" }
            },
            "required": ["agent_ids"]
        }),
    }
}

pub fn send_agent_update_def() -> ToolDefinition {
    ToolDefinition {
        name: "send_agent_update".to_string(),
        description: "Unblock a sub-agent that is awaiting_orchestrator, optionally granting it \
            new skills or context files."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "agent_id": { "type": "string" },
                "message": { "type": "string" },
                "skills": { "type": "array", "items": { "type": "string" } },
                "context_files": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["agent_id"]
        }),
    }
}

/// Single-loop mode's added affordance. Enum-restricted to the granted
/// read-only skill set, mirroring `conductor_agent::use_skill_def`'s
/// cache-stable sorted enum.
pub fn use_skill_def(read_only_skills: &[String]) -> ToolDefinition {
    let mut sorted = read_only_skills.to_vec();
    sorted.sort();
    ToolDefinition {
        name: "use_skill".to_string(),
        description: "Directly invoke one read-only skill without dispatching a sub-agent."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "skill": { "type": "string", "enum": sorted },
                "arguments": { "type": "object" }
            },
            "required": ["skill", "arguments"]
        }),
    }
}

/// The tool surface for the given mode. `multi_agent` exposes exactly the
/// four orchestrator tools; `single_loop` keeps all four (they
/// remain valid escape hatches for work that genuinely needs isolation or
/// background execution) and adds `use_skill` for latency-sensitive direct
/// reads.
///
/// The four mode-invariant tools are compiled once and cached; `use_skill`'s enum depends on the live read-only
/// skill set, so it is built fresh and appended rather than cached.
pub fn orchestrator_tools(mode: Mode, read_only_skills: &[String]) -> Vec<ToolDefinition> {
    let base = conductor_context::tool_definitions(conductor_context::ToolSurface::Orchestrator, || {
        let mut defs = vec![get_skill_def(), dispatch_agent_def(), get_agent_results_def(), send_agent_update_def()];
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    });
    let mut defs = base.to_vec();
    if mode == Mode::SingleLoop {
        defs.push(use_skill_def(read_only_skills));
        defs.sort_by(|a, b| a.name.cmp(&b.name));
    }
    defs
}

/// `get_skill(name?)`: no argument returns a brief of every
/// domain; `domain` returns that domain's index; `domain.action` returns one
/// skill's full markdown; `domain.all` returns every skill in the domain
/// concatenated.
pub fn handle_get_skill(skills: &dyn SkillRegistry, name: Option<&str>) -> String {
    let Some(name) = name else {
        let mut domains = skills.domains();
        domains.sort_by(|a, b| a.domain.cmp(&b.domain));
        if domains.is_empty() {
            return "no skill domains registered".to_string();
        }
        let mut out = String::new();
        for d in &domains {
            let mut names = d.skills.clone();
            names.sort();
            out.push_str(&format!("- {}: {} ({})\n", d.domain, d.brief, names.join(", ")));
        }
        return out;
    };

    if let Some(domain) = name.strip_suffix(".all") {
        let mut docs = skills.domain_all(domain);
        if docs.is_empty() {
            return format!("skill_not_found: unknown domain '{domain}'");
        }
        docs.sort_by(|a, b| a.name.cmp(&b.name));
        let mut out = String::new();
        for doc in &docs {
            out.push_str(&format!("---\n# {}\n{}\n", doc.name, doc.markdown));
        }
        return out;
    }

    if name.contains('.') {
        return match skills.get(name) {
            Some(doc) => format!("# {}\n{}", doc.name, doc.markdown),
            None => format!("skill_not_found: '{name}' has no registered skill"),
        };
    }

    let domains = skills.domains();
    match domains.into_iter().find(|d| d.domain == name) {
        Some(d) => {
            let mut names = d.skills;
            names.sort();
            format!("{}: {}\nSkills: {}", d.domain, d.brief, names.join(", "))
        }
        None => format!("skill_not_found: unknown domain '{name}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::skill::{SkillDoc, StaticSkillRegistry};

    fn registry() -> StaticSkillRegistry {
        let mut r = StaticSkillRegistry::new();
        r.insert(SkillDoc {
            name: "calendar.list".to_string(),
            domain: "calendar".to_string(),
            description: "List events".to_string(),
            markdown: "# calendar.list\nLists events.".to_string(),
        });
        r.insert(SkillDoc {
            name: "calendar.create".to_string(),
            domain: "calendar".to_string(),
            description: "Create an event".to_string(),
            markdown: "# calendar.create\nCreates an event.".to_string(),
        });
        r
    }

    #[test]
    fn no_name_lists_every_domain() {
        let out = handle_get_skill(&registry(), None);
        assert!(out.contains("calendar"));
        assert!(out.contains("calendar.create"));
    }

    #[test]
    fn domain_name_returns_its_index() {
        let out = handle_get_skill(&registry(), Some("calendar"));
        assert!(out.contains("Skills: calendar.create, calendar.list"));
    }

    #[test]
    fn domain_action_returns_one_skills_markdown() {
        let out = handle_get_skill(&registry(), Some("calendar.list"));
        assert!(out.contains("Lists events."));
        assert!(!out.contains("Creates an event."));
    }

    #[test]
    fn domain_all_concatenates_every_skill() {
        let out = handle_get_skill(&registry(), Some("calendar.all"));
        assert!(out.contains("Lists events."));
        assert!(out.contains("Creates an event."));
    }

    #[test]
    fn unknown_name_is_skill_not_found() {
        assert!(handle_get_skill(&registry(), Some("nope")).starts_with("skill_not_found"));
    }

    #[test]
    fn multi_agent_exposes_exactly_four_tools() {
        let defs = orchestrator_tools(Mode::MultiAgent, &[]);
        assert_eq!(defs.len(), 4);
    }

    #[test]
    fn single_loop_adds_use_skill() {
        let defs = orchestrator_tools(Mode::SingleLoop, &["calendar.list".to_string()]);
        assert_eq!(defs.len(), 5);
        assert!(defs.iter().any(|d| d.name == "use_skill"));
    }
}
