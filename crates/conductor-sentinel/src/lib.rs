//! Sentinel: a context-isolated LLM classifier invoked by the Sub-Agent
//! immediately before executing a skill call that has already passed scope
//! and policy checks.
//!
//! Errors in the classification call are *fail-open* — approve with a
//! warning log — because scope enforcement in the sub-agent is the primary
//! security boundary and the Sentinel is coarse, best-effort defense in
//! depth on top of it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use conductor_core::message::{LlmResponse, Message};
use conductor_llm::{ChatOptions, LlmClient};

/// Hardcoded stand-in for "a fast/cheap default" when neither the
/// `sentinel` nor `compaction` role has a configured model. Recorded as an Open
/// Question resolution in DESIGN.md.
pub const FALLBACK_MODEL: &str = "gpt-4o-mini";

const MAX_TOKENS: u64 = 150;

/// Resolves the model the Sentinel calls: `sentinel` role, then
/// `compaction` role, then [`FALLBACK_MODEL`].
pub fn resolve_model(role_defaults: &std::collections::HashMap<String, String>) -> String {
    role_defaults
        .get("sentinel")
        .or_else(|| role_defaults.get("compaction"))
        .cloned()
        .unwrap_or_else(|| FALLBACK_MODEL.to_string())
}

/// The proposed action a sub-agent is about to execute.
#[derive(Debug, Clone)]
pub struct ProposedAction<'a> {
    pub skill_name: &'a str,
    pub arguments: &'a Value,
    pub agent_id: &'a str,
}

/// The three fixed inputs the Sentinel evaluates.
#[derive(Debug, Clone)]
pub struct ClassifyInput<'a> {
    /// The user's original request, if available to this sub-agent.
    pub original_request: Option<&'a str>,
    pub mission: &'a str,
    pub action: ProposedAction<'a>,
}

/// Classification outcome: approve, or reject with a one-line reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected { reason: String },
}

impl Decision {
    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approved)
    }
}

#[derive(Debug, Deserialize)]
struct ClassifierReply {
    decision: String,
    reason: String,
}

/// Strict JSON schema the classifier's response is constrained to.
fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "decision": { "type": "string", "enum": ["approve", "reject"] },
            "reason": { "type": "string" }
        },
        "required": ["decision", "reason"],
        "additionalProperties": false
    })
}

/// The two evaluation axes and reasoning principles the Sentinel's system
/// prompt encodes.
fn system_prompt() -> &'static str {
    "You are a security gate for an AI agent orchestration system. You \
     evaluate one proposed tool call against two axes before it executes: \
     (1) alignment with the user's original request, and (2) alignment with \
     the dispatched sub-agent's mission scope.\n\n\
     Reasoning principles:\n\
     - Read-only actions (names ending in .search, .list, .get, .read) are \
       low-risk and may be approved under loose alignment.\n\
     - A read-before-write prerequisite call is valid workflow even if it is \
       not itself the end goal.\n\
     - Mutating actions require clear alignment with the request and mission.\n\
     - Irreversible actions (send, archive, delete) require strong alignment; \
       reject on any meaningful doubt.\n\
     - An agent must stay within its mission's domain; a call far outside \
       the stated mission should be rejected even if plausible in isolation.\n\n\
     Respond with strict JSON: {\"decision\": \"approve\"|\"reject\", \"reason\": \"<one line>\"}."
}

fn user_turn(input: &ClassifyInput<'_>) -> String {
    format!(
        "Original user request: {}\n\nAgent mission: {}\n\nProposed action:\n  agent_id: {}\n  skill: {}\n  arguments: {}",
        input.original_request.unwrap_or("(not available to this agent)"),
        input.mission,
        input.action.agent_id,
        input.action.skill_name,
        input.action.arguments,
    )
}

/// Runs the classifier. Never returns an error — LLM failures and parse
/// failures are fail-open, logged as warnings, and reported as
/// [`Decision::Approved`].
pub async fn classify(client: &dyn LlmClient, model: &str, input: ClassifyInput<'_>) -> Decision {
    let messages = vec![Message::user(user_turn(&input))];
    let options = ChatOptions {
        model: model.to_string(),
        tools: Vec::new(),
        temperature: Some(0.0),
        max_tokens: Some(MAX_TOKENS),
        response_format: Some(response_schema()),
        api_key_override: None,
    };

    // The classifier runs in its own call with its own system-prompt-only
    // context, isolated from the sub-agent's inner-loop history.
    let mut call_messages = vec![Message::system(system_prompt())];
    call_messages.extend(messages);

    let response = match client.chat(&call_messages, &options).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, skill = input.action.skill_name, "sentinel call failed, failing open");
            return Decision::Approved;
        }
    };

    let text = match response {
        LlmResponse::Text { content, .. } => content,
        LlmResponse::ToolCalls { content: Some(content), .. } => content,
        LlmResponse::ToolCalls { content: None, .. } => {
            tracing::warn!(skill = input.action.skill_name, "sentinel returned tool calls instead of text, failing open");
            return Decision::Approved;
        }
    };

    match serde_json::from_str::<ClassifierReply>(&text) {
        Ok(reply) => match reply.decision.as_str() {
            "approve" => Decision::Approved,
            "reject" => Decision::Rejected { reason: reply.reason },
            other => {
                tracing::warn!(decision = other, "sentinel returned unknown decision value, failing open");
                Decision::Approved
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, raw = %text, "sentinel reply failed to parse, failing open");
            Decision::Approved
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conductor_core::message::Usage;
    use std::sync::Mutex;

    struct FakeClient {
        reply: Mutex<Option<Result<String, String>>>,
    }

    #[async_trait]
    impl LlmClient for FakeClient {
        async fn chat(&self, _messages: &[Message], _options: &ChatOptions) -> Result<LlmResponse, conductor_llm::LlmError> {
            match self.reply.lock().unwrap().take() {
                Some(Ok(text)) => Ok(LlmResponse::Text { content: text, usage: Usage::default() }),
                Some(Err(_)) | None => Err(conductor_llm::LlmError::Parse("no reply configured".to_string())),
            }
        }
    }

    fn action<'a>() -> ProposedAction<'a> {
        ProposedAction { skill_name: "calendar.list", arguments: &Value::Null, agent_id: "cal" }
    }

    #[tokio::test]
    async fn approves_on_approve_decision() {
        let client = FakeClient { reply: Mutex::new(Some(Ok(r#"{"decision":"approve","reason":"read-only, aligned"}"#.to_string()))) };
        let input = ClassifyInput { original_request: Some("what's on my calendar"), mission: "list today", action: action() };
        let decision = classify(&client, "gpt-4o-mini", input).await;
        assert_eq!(decision, Decision::Approved);
    }

    #[tokio::test]
    async fn rejects_with_reason_on_reject_decision() {
        let client = FakeClient { reply: Mutex::new(Some(Ok(r#"{"decision":"reject","reason":"out of mission scope"}"#.to_string()))) };
        let input = ClassifyInput { original_request: None, mission: "list today", action: action() };
        let decision = classify(&client, "gpt-4o-mini", input).await;
        assert_eq!(decision, Decision::Rejected { reason: "out of mission scope".to_string() });
    }

    #[tokio::test]
    async fn fails_open_on_transport_error() {
        let client = FakeClient { reply: Mutex::new(None) };
        let input = ClassifyInput { original_request: None, mission: "list today", action: action() };
        let decision = classify(&client, "gpt-4o-mini", input).await;
        assert_eq!(decision, Decision::Approved);
    }

    #[tokio::test]
    async fn fails_open_on_malformed_json() {
        let client = FakeClient { reply: Mutex::new(Some(Ok("not json".to_string()))) };
        let input = ClassifyInput { original_request: None, mission: "list today", action: action() };
        let decision = classify(&client, "gpt-4o-mini", input).await;
        assert_eq!(decision, Decision::Approved);
    }

    #[test]
    fn role_resolution_prefers_sentinel_then_compaction_then_fallback() {
        let mut roles = std::collections::HashMap::new();
        assert_eq!(resolve_model(&roles), FALLBACK_MODEL);
        roles.insert("compaction".to_string(), "compaction-model".to_string());
        assert_eq!(resolve_model(&roles), "compaction-model");
        roles.insert("sentinel".to_string(), "sentinel-model".to_string());
        assert_eq!(resolve_model(&roles), "sentinel-model");
    }
}
