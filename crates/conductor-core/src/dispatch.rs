//! Dispatch parameters and agent results.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Parameters produced by the orchestrator's `dispatch_agent` tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchParams {
    /// Unique within the turn; used as a DAG node identifier.
    pub agent_id: String,
    /// Free text the sub-agent treats as its user message.
    pub mission: String,
    /// Skill names the sub-agent is allowed to invoke.
    pub skills: HashSet<String>,
    /// Other `agent_id`s in the same batch that must complete first.
    #[serde(default)]
    pub depends_on: HashSet<String>,
    /// Per-agent skill-call budget (defaults to 5).
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: usize,
    /// Ordered set of file paths to prepend to the sub-agent's system prompt.
    #[serde(default)]
    pub context_files: Vec<String>,
    /// Explicit model identifier overriding the `sub_agent` role default.
    #[serde(default)]
    pub model_override: Option<String>,
    /// Optional free-text additional context.
    #[serde(default)]
    pub context: Option<String>,
}

fn default_max_tool_calls() -> usize {
    5
}

/// Terminal/transient status of a dispatched sub-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Completed,
    Failed,
    Timeout,
    /// Produced only by the scheduler when a transitive dependency failed.
    Skipped,
    /// Only visible while the agent is paused.
    AwaitingOrchestrator,
}

impl AgentStatus {
    /// Terminal statuses stop the scheduler's wave/skip bookkeeping from
    /// tracking the agent any further.
    pub fn is_terminal(self) -> bool {
        !matches!(self, AgentStatus::AwaitingOrchestrator)
    }

    /// Statuses the cascading-skip algorithm treats as a dependency failure.
    pub fn is_failure(self) -> bool {
        matches!(self, AgentStatus::Failed | AgentStatus::Timeout)
    }
}

/// Result of a dispatched sub-agent's run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub status: AgentStatus,
    pub result: String,
    pub tool_calls_used: usize,
    pub duration_ms: u64,
}

impl AgentResult {
    pub fn completed(result: impl Into<String>, tool_calls_used: usize, duration_ms: u64) -> Self {
        Self { status: AgentStatus::Completed, result: result.into(), tool_calls_used, duration_ms }
    }

    pub fn failed(result: impl Into<String>, duration_ms: u64) -> Self {
        Self { status: AgentStatus::Failed, result: result.into(), tool_calls_used: 0, duration_ms }
    }

    pub fn timeout(duration_ms: u64) -> Self {
        Self { status: AgentStatus::Timeout, result: "timed out".to_string(), tool_calls_used: 0, duration_ms }
    }

    pub fn skipped(failed_ancestors: &[String]) -> Self {
        Self {
            status: AgentStatus::Skipped,
            result: format!("skipped because dependency failed: {}", failed_ancestors.join(", ")),
            tool_calls_used: 0,
            duration_ms: 0,
        }
    }
}

/// An update the orchestrator posts to unblock a paused sub-agent
/// (`send_agent_update`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentUpdate {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub skills: Option<HashSet<String>>,
    #[serde(default)]
    pub context_files: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_result_names_failed_ancestors() {
        let r = AgentResult::skipped(&["a".to_string()]);
        assert_eq!(r.status, AgentStatus::Skipped);
        assert!(r.result.contains('a'));
    }

    #[test]
    fn status_classification() {
        assert!(AgentStatus::Failed.is_failure());
        assert!(AgentStatus::Timeout.is_failure());
        assert!(!AgentStatus::Completed.is_failure());
        assert!(!AgentStatus::AwaitingOrchestrator.is_terminal());
    }
}
