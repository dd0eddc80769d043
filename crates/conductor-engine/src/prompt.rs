//! Orchestrator system-prompt text. Distinct from `conductor_agent::identity_and_rules`:
//! the orchestrator's identity describes dispatching and waiting on
//! sub-agents rather than a single scoped mission.

use crate::state::Mode;

/// The stable identity/rules text handed to the Context Assembler's
/// long-TTL system message, alongside the sorted skill-domain briefs it
/// appends itself.
pub fn identity_and_rules(mode: Mode) -> String {
    match mode {
        Mode::MultiAgent => {
            "You are the orchestrator of a multi-agent task system. You do not execute \
             domain skills yourself. Use get_skill to read what a domain or skill can do, \
             dispatch_agent to hand bounded missions to scoped sub-agents, get_agent_results \
             to check on or wait for dispatched agents, and send_agent_update to unblock an \
             agent that has paused to ask for help. Dispatch agents that can run independently \
             in the same call so they execute concurrently; use depends_on only when one \
             agent's mission genuinely requires another's output."
                .to_string()
        }
        Mode::SingleLoop => {
            "You are the orchestrator for a latency-sensitive channel. Prefer get_skill to \
             read a skill directly and answer immediately. Only use dispatch_agent when the \
             work needs an isolated tool budget, a different model, or must run in the \
             background while you keep responding."
                .to_string()
        }
    }
}
