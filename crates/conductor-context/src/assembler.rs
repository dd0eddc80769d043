//! Assembles the final request payload: system message, optional context
//! block, then trimmed history.

use conductor_core::message::Message;

use super::budget::token_budget;
use super::system_prompt::{build_context_block, build_system_message};
use super::trim::{trim_history, UsageBaseline};

/// Inputs the engine/sub-agent loop supplies for one assembly pass.
pub struct AssembleRequest<'a> {
    pub identity_and_rules: &'a str,
    pub skill_domains: &'a [String],
    pub memory_snippets: Option<&'a str>,
    pub task_summary: Option<&'a str>,
    pub history: &'a [Message],
    pub max_context_tokens: u64,
    pub utilization_target: f64,
    pub response_reserve_tokens: u64,
    pub usage_baseline: Option<UsageBaseline>,
}

/// Builds the full message sequence to send to the LLM for one call.
pub fn assemble(request: AssembleRequest<'_>) -> Vec<Message> {
    let budget = token_budget(request.max_context_tokens, request.utilization_target, request.response_reserve_tokens);

    let mut out = Vec::with_capacity(request.history.len() + 3);
    out.push(build_system_message(request.identity_and_rules, request.skill_domains));
    if let Some((user, ack)) = build_context_block(request.memory_snippets, request.task_summary) {
        out.push(user);
        out.push(ack);
    }
    out.extend(trim_history(request.history, budget, request.usage_baseline));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_context_block_when_empty() {
        let history = vec![Message::user("hi")];
        let out = assemble(AssembleRequest {
            identity_and_rules: "rules",
            skill_domains: &[],
            memory_snippets: None,
            task_summary: None,
            history: &history,
            max_context_tokens: 100_000,
            utilization_target: 0.85,
            response_reserve_tokens: 4_096,
            usage_baseline: None,
        });
        // system message + 1 history message, no context block pair.
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn includes_context_block_when_present() {
        let history = vec![Message::user("hi")];
        let out = assemble(AssembleRequest {
            identity_and_rules: "rules",
            skill_domains: &[],
            memory_snippets: Some("likes dark mode"),
            task_summary: None,
            history: &history,
            max_context_tokens: 100_000,
            utilization_target: 0.85,
            response_reserve_tokens: 4_096,
            usage_baseline: None,
        });
        assert_eq!(out.len(), 4);
    }
}
