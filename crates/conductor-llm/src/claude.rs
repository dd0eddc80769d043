//! Anthropic Claude native `/v1/messages` wire format, including the
//! `cache_control` breakpoint mapping for `CacheTtl`.

use conductor_core::message::{CacheTtl, LlmResponse, Message, MessageContent, Role, ToolCall, Usage};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ChatOptions, LlmError};

pub(super) async fn chat(
    http: &reqwest::Client,
    api_base: &str,
    api_key: &str,
    messages: &[Message],
    options: &ChatOptions,
) -> Result<LlmResponse, LlmError> {
    let url = format!("{api_base}/messages");
    let (system, claude_messages) = convert_messages(messages);

    let mut body = json!({
        "model": options.model,
        "max_tokens": options.max_tokens.unwrap_or(4096),
        "messages": claude_messages,
    });
    if let Some(system) = system {
        body["system"] = system;
    }
    if let Some(temperature) = options.temperature {
        body["temperature"] = json!(temperature);
    }
    if !options.tools.is_empty() {
        body["tools"] = json!(options
            .tools
            .iter()
            .map(|t| json!({ "name": t.name, "description": t.description, "input_schema": t.parameters }))
            .collect::<Vec<_>>());
    }

    let resp = http
        .post(&url)
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(LlmError::Api { status: status.as_u16(), body: body_text });
    }

    let parsed: MessagesResponse = resp.json().await.map_err(|e| LlmError::Parse(e.to_string()))?;
    from_wire_response(parsed)
}

/// Converts the internal message history to Claude's shape: the leading
/// system messages merge into a top-level `system` field (itself an array
/// of cache-aware blocks when any carry a `CacheTtl`), and consecutive tool
/// results are batched into a single `user` message of `tool_result` blocks.
fn convert_messages(messages: &[Message]) -> (Option<Value>, Vec<Value>) {
    let mut system_blocks: Vec<Value> = Vec::new();
    let mut out: Vec<Value> = Vec::new();
    let mut pending_tool_results: Vec<Value> = Vec::new();

    for msg in messages {
        if !matches!(msg.role, Role::Tool) && !pending_tool_results.is_empty() {
            out.push(json!({ "role": "user", "content": std::mem::take(&mut pending_tool_results) }));
        }

        match msg.role {
            Role::System => {
                system_blocks.extend(content_to_blocks(msg.content.as_ref()));
            }
            Role::User => {
                out.push(json!({ "role": "user", "content": msg.content.as_ref().map(MessageContent::as_text).unwrap_or_default() }));
            }
            Role::Assistant => {
                let mut blocks = content_to_blocks(msg.content.as_ref());
                if let Some(tool_calls) = &msg.tool_calls {
                    for tc in tool_calls {
                        blocks.push(json!({ "type": "tool_use", "id": tc.id, "name": tc.name, "input": tc.arguments }));
                    }
                }
                if !blocks.is_empty() {
                    out.push(json!({ "role": "assistant", "content": blocks }));
                }
            }
            Role::Tool => {
                let tool_use_id = msg.tool_call_id.clone().unwrap_or_default();
                let content = msg.content.as_ref().map(MessageContent::as_text).unwrap_or_default();
                pending_tool_results.push(json!({ "type": "tool_result", "tool_use_id": tool_use_id, "content": content }));
            }
        }
    }
    if !pending_tool_results.is_empty() {
        out.push(json!({ "role": "user", "content": pending_tool_results }));
    }

    let system = if system_blocks.is_empty() { None } else { Some(json!(system_blocks)) };
    (system, out)
}

fn content_to_blocks(content: Option<&MessageContent>) -> Vec<Value> {
    match content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) if text.is_empty() => Vec::new(),
        Some(MessageContent::Text(text)) => vec![json!({ "type": "text", "text": text })],
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .filter(|p| !p.text.is_empty())
            .map(|p| {
                let mut block = json!({ "type": "text", "text": p.text });
                if let Some(ttl) = p.cache {
                    block["cache_control"] = json!({ "type": "ephemeral", "ttl": cache_ttl_wire(ttl) });
                }
                block
            })
            .collect(),
    }
}

fn cache_ttl_wire(ttl: CacheTtl) -> &'static str {
    match ttl {
        CacheTtl::Long => "1h",
        CacheTtl::Short => "5m",
    }
}

fn from_wire_response(response: MessagesResponse) -> Result<LlmResponse, LlmError> {
    let mut text = String::new();
    let mut calls = Vec::new();
    for block in response.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(&t),
            ContentBlock::ToolUse { id, name, input } => calls.push(ToolCall { id, name, arguments: input }),
        }
    }
    let usage = Usage {
        prompt_tokens: response.usage.input_tokens,
        completion_tokens: response.usage.output_tokens,
        total_tokens: response.usage.input_tokens + response.usage.output_tokens,
        cost: None,
        cache_read_tokens: response.usage.cache_read_input_tokens,
        cache_write_tokens: response.usage.cache_creation_input_tokens,
    };

    if calls.is_empty() {
        Ok(LlmResponse::Text { content: text, usage })
    } else {
        Ok(LlmResponse::ToolCalls { content: if text.is_empty() { None } else { Some(text) }, calls, usage })
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u64,
    output_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::message::ContentPart;

    #[test]
    fn merges_system_messages_and_attaches_cache_control() {
        let messages = vec![Message::system_parts(vec![ContentPart::cached("rules", CacheTtl::Long)])];
        let (system, _) = convert_messages(&messages);
        let system = system.unwrap();
        assert_eq!(system[0]["cache_control"]["ttl"], json!("1h"));
    }

    #[test]
    fn batches_consecutive_tool_results_into_one_user_message() {
        let messages = vec![
            Message::user("go"),
            Message::tool_result("call-1", "ok1"),
            Message::tool_result("call-2", "ok2"),
        ];
        let (_, claude_messages) = convert_messages(&messages);
        assert_eq!(claude_messages.len(), 2);
        assert_eq!(claude_messages[1]["content"].as_array().unwrap().len(), 2);
    }
}
