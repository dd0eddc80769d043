//! Conversation message, tool call, and usage types.

use serde::{Deserialize, Serialize};

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Prompt-cache breakpoint hint attached to a content part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTtl {
    /// ~1 hour: the system message's stable identity/rules block.
    Long,
    /// ~5 minutes: the per-turn memory/task-summary context block.
    Short,
}

/// A single content part of a message, carrying an optional cache breakpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheTtl>,
}

impl ContentPart {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), cache: None }
    }

    pub fn cached(text: impl Into<String>, ttl: CacheTtl) -> Self {
        Self { text: text.into(), cache: Some(ttl) }
    }
}

/// Message content: either a plain string or an ordered sequence of parts
/// (used to attach cache breakpoints). Insertion order within `Parts` is
/// semantically significant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Flatten to a plain string, concatenating parts with no separator.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join(""),
        }
    }

    /// Rough byte length, used by the Context Assembler's token estimator.
    pub fn byte_len(&self) -> usize {
        match self {
            MessageContent::Text(s) => s.len(),
            MessageContent::Parts(parts) => parts.iter().map(|p| p.text.len()).sum(),
        }
    }
}

/// A tool call emitted by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Decoded key→value mapping.
    pub arguments: serde_json::Value,
}

/// A tool definition offered to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A conversation message. Ordered sequence within a conversation;
/// insertion order is semantically significant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: Some(MessageContent::Text(text.into())), tool_calls: None, tool_call_id: None }
    }

    pub fn system_parts(parts: Vec<ContentPart>) -> Self {
        Self { role: Role::System, content: Some(MessageContent::Parts(parts)), tool_calls: None, tool_call_id: None }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: Some(MessageContent::Text(text.into())), tool_calls: None, tool_call_id: None }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self { role: Role::User, content: Some(MessageContent::Parts(parts)), tool_calls: None, tool_call_id: None }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: Some(MessageContent::Text(text.into())), tool_calls: None, tool_call_id: None }
    }

    pub fn assistant_tool_calls(text: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.map(MessageContent::Text),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(MessageContent::Text(content.into())),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Rough byte length used by the token-estimation fallback in the
    /// Context Assembler (4 bytes/token + 4 tokens framing per message).
    pub fn byte_len(&self) -> usize {
        self.content.as_ref().map(MessageContent::byte_len).unwrap_or(0)
            + self
                .tool_calls
                .as_ref()
                .map(|tcs| tcs.iter().map(|tc| tc.name.len() + tc.arguments.to_string().len()).sum())
                .unwrap_or(0)
    }
}

/// LLM call usage accounting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_write_tokens: Option<u64>,
}

/// LLM response classification: either a terminal text answer or a batch of
/// tool calls.
#[derive(Debug, Clone)]
pub enum LlmResponse {
    Text { content: String, usage: Usage },
    ToolCalls { content: Option<String>, calls: Vec<ToolCall>, usage: Usage },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_content_flattens_parts() {
        let c = MessageContent::Parts(vec![ContentPart::plain("a"), ContentPart::cached("b", CacheTtl::Long)]);
        assert_eq!(c.as_text(), "ab");
    }

    #[test]
    fn tool_result_carries_call_id() {
        let m = Message::tool_result("call-1", "ok");
        assert_eq!(m.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(m.role, Role::Tool);
    }
}
