//! OpenAI-compatible `/chat/completions` wire format.

use conductor_core::message::{LlmResponse, Message, Role, ToolCall, Usage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ChatOptions, LlmError};

pub(super) async fn chat(
    http: &reqwest::Client,
    api_base: &str,
    api_key: &str,
    messages: &[Message],
    options: &ChatOptions,
) -> Result<LlmResponse, LlmError> {
    let url = format!("{api_base}/chat/completions");
    let mut body = json!({
        "model": options.model,
        "messages": messages.iter().map(to_wire_message).collect::<Vec<_>>(),
    });

    if let Some(max_tokens) = options.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = options.temperature {
        body["temperature"] = json!(temperature);
    }
    if !options.tools.is_empty() {
        body["tools"] = json!(options
            .tools
            .iter()
            .map(|t| json!({
                "type": "function",
                "function": { "name": t.name, "description": t.description, "parameters": t.parameters },
            }))
            .collect::<Vec<_>>());
    }
    if let Some(schema) = &options.response_format {
        body["response_format"] = json!({ "type": "json_schema", "json_schema": schema });
    }

    let resp = http
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(LlmError::Api { status: status.as_u16(), body: body_text });
    }

    let parsed: ChatCompletionResponse = resp.json().await.map_err(|e| LlmError::Parse(e.to_string()))?;
    from_wire_response(parsed)
}

/// Serializes a `Message` to the OpenAI wire shape. Cache breakpoints are an
/// Anthropic-specific concept and are dropped here — `Parts` content is
/// flattened to plain text, matching how OpenAI-compatible providers ignore
/// unknown content-part fields anyway.
fn to_wire_message(message: &Message) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut wire = json!({ "role": role });
    if let Some(content) = &message.content {
        wire["content"] = json!(content.as_text());
    }
    if let Some(tool_calls) = &message.tool_calls {
        wire["tool_calls"] = json!(tool_calls
            .iter()
            .map(|tc| json!({
                "id": tc.id,
                "type": "function",
                "function": { "name": tc.name, "arguments": tc.arguments.to_string() },
            }))
            .collect::<Vec<_>>());
    }
    if let Some(tool_call_id) = &message.tool_call_id {
        wire["tool_call_id"] = json!(tool_call_id);
    }
    wire
}

fn from_wire_response(response: ChatCompletionResponse) -> Result<LlmResponse, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Parse("chat completion response had no choices".to_string()))?;
    let usage = response
        .usage
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
            cost: None,
            cache_read_tokens: u.prompt_tokens_details.and_then(|d| d.cached_tokens),
            cache_write_tokens: None,
        })
        .unwrap_or_default();

    match choice.message.tool_calls {
        Some(wire_calls) if !wire_calls.is_empty() => {
            let calls = wire_calls
                .into_iter()
                .map(|c| {
                    let arguments: Value = serde_json::from_str(&c.function.arguments).unwrap_or(Value::Null);
                    ToolCall { id: c.id, name: c.function.name, arguments }
                })
                .collect();
            Ok(LlmResponse::ToolCalls { content: choice.message.content, calls, usage })
        }
        _ => Ok(LlmResponse::Text { content: choice.message.content.unwrap_or_default(), usage }),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
    #[serde(default)]
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Deserialize, Serialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: Option<u64>,
}

/// Heuristic for whether an error message indicates a context-window
/// overflow.
pub fn is_context_overflow_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("context_length_exceeded")
        || lower.contains("maximum context length")
        || lower.contains("token limit")
        || lower.contains("too many tokens")
        || lower.contains("context window")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_parts_content_to_plain_text() {
        let msg = Message::user("hi there");
        let wire = to_wire_message(&msg);
        assert_eq!(wire["content"], json!("hi there"));
    }

    #[test]
    fn detects_overflow_phrases() {
        assert!(is_context_overflow_error("Error: maximum context length exceeded"));
        assert!(!is_context_overflow_error("rate limited"));
    }
}
