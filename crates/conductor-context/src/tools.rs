//! Tool-definition compilation: built once per process per tool-surface
//! kind, sorted alphabetically by name, and cloned into every request.
//! Tool definitions are compiled once at process start.

use std::sync::OnceLock;

use conductor_core::message::ToolDefinition;

/// Which fixed tool surface a request is for. The orchestrator and
/// sub-agent surfaces are disjoint and each gets its own cache
/// slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolSurface {
    Orchestrator,
    SubAgent,
}

static ORCHESTRATOR_TOOLS: OnceLock<Vec<ToolDefinition>> = OnceLock::new();
static SUB_AGENT_TOOLS: OnceLock<Vec<ToolDefinition>> = OnceLock::new();

fn sorted(mut defs: Vec<ToolDefinition>) -> Vec<ToolDefinition> {
    defs.sort_by(|a, b| a.name.cmp(&b.name));
    defs
}

/// Returns the cached, sorted definitions for `surface`, building them with
/// `build` on first use. `build` is only ever invoked once per surface per
/// process.
pub fn tool_definitions(surface: ToolSurface, build: impl FnOnce() -> Vec<ToolDefinition>) -> &'static [ToolDefinition] {
    let cell = match surface {
        ToolSurface::Orchestrator => &ORCHESTRATOR_TOOLS,
        ToolSurface::SubAgent => &SUB_AGENT_TOOLS,
    };
    cell.get_or_init(|| sorted(build()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(name: &str) -> ToolDefinition {
        ToolDefinition { name: name.to_string(), description: String::new(), parameters: json!({}) }
    }

    #[test]
    fn caches_and_sorts_by_name() {
        let defs = tool_definitions(ToolSurface::SubAgent, || vec![def("use_skill"), def("request_help")]);
        assert_eq!(defs.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(), vec!["request_help", "use_skill"]);
    }
}
