//! Sub-agent system-prompt assembly. Built on top of
//! the Context Assembler's generic cache-aware layout (`conductor-context`):
//! context-file documents and granted-skill markdown go into the long-TTL
//! system message (stable across the agent's lifetime), dependency-result
//! summaries go into the short-TTL context block (specific to this dispatch),
//! and the mission is the first message of the inner loop's own history.

use std::collections::HashMap;

use conductor_core::dispatch::AgentResult;

/// The stable part of the sub-agent's system prompt: role instructions,
/// prepended context-file documents, then the granted skills' markdown
/// (already sorted by `SkillRegistry::markdown_for`).
pub fn identity_and_rules(context_files: &[(String, String)], skill_markdown: &[(String, String)]) -> String {
    let mut out = String::from(
        "You are a sub-agent executing one scoped mission for a larger \
         orchestration system. You may only call the skills granted to you \
         below, and only for work inside your mission. If you lack a \
         capability needed to proceed, call request_help instead of \
         guessing or improvising outside your scope.\n",
    );

    for (path, content) in context_files {
        out.push_str(&format!("\n## Context file: {path}\n{content}\n"));
    }

    for (name, markdown) in skill_markdown {
        out.push_str(&format!("\n---\n# Skill: {name}\n{markdown}\n"));
    }

    out
}

/// The per-dispatch context block: a summary of already-completed
/// dependency results, sorted by `agent_id` for determinism. `None` when
/// there are no dependencies, so the Context Assembler omits the block.
pub fn dependency_summary(dep_results: &HashMap<String, AgentResult>) -> Option<String> {
    if dep_results.is_empty() {
        return None;
    }
    let mut ids: Vec<&String> = dep_results.keys().collect();
    ids.sort();

    let mut out = String::from("Results from completed dependencies:\n");
    for id in ids {
        let r = &dep_results[id];
        out.push_str(&format!("- {id} ({:?}): {}\n", r.status, r.result));
    }
    Some(out)
}
