//! LLM client contract: a single `chat(messages, options)`
//! operation, with a concrete HTTP implementation that auto-routes between
//! the OpenAI-compatible `/chat/completions` shape and the Anthropic Claude
//! native `/v1/messages` shape depending on the resolved model/API base.

mod claude;
mod openai;

use async_trait::async_trait;
use conductor_core::message::{LlmResponse, Message, ToolDefinition};
use serde_json::Value;

/// Per-call options.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    /// Strict JSON-schema response format, used by the Sentinel's
    /// classification call.
    pub response_format: Option<Value>,
    /// Per-user API key, overriding the process-wide default.
    pub api_key_override: Option<String>,
}

impl ChatOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            tools: Vec::new(),
            temperature: None,
            max_tokens: None,
            response_format: None,
            api_key_override: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_response_format(mut self, schema: Value) -> Self {
        self.response_format = Some(schema);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse LLM API response: {0}")]
    Parse(String),
}

/// A single operation, `chat`, matching LLM client contract
/// exactly: `(messages, options) -> (response, error)`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<LlmResponse, LlmError>;
}

/// Chooses the wire format for a model/API base pair. Claude native is used
/// when the model name starts with `claude` or the API base mentions
/// anthropic/claude; everything else uses the OpenAI-compatible shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    OpenAi,
    Claude,
}

pub fn detect_wire_format(model: &str, api_base: &str) -> WireFormat {
    let model = model.to_lowercase();
    let base = api_base.to_lowercase();
    if model.starts_with("claude") || base.contains("anthropic") || base.contains("claude") {
        WireFormat::Claude
    } else {
        WireFormat::OpenAi
    }
}

/// HTTP-backed `LlmClient` auto-routing between the OpenAI-compatible and
/// Claude-native wire formats.
pub struct HttpLlmClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl HttpLlmClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .expect("failed to build HTTP client");
        Self { http, api_base: api_base.into().trim_end_matches('/').to_string(), api_key: api_key.into() }
    }

    fn api_key_for(&self, options: &ChatOptions) -> String {
        options.api_key_override.clone().unwrap_or_else(|| self.api_key.clone())
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<LlmResponse, LlmError> {
        match detect_wire_format(&options.model, &self.api_base) {
            WireFormat::OpenAi => openai::chat(&self.http, &self.api_base, &self.api_key_for(options), messages, options).await,
            WireFormat::Claude => claude::chat(&self.http, &self.api_base, &self.api_key_for(options), messages, options).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_claude_by_model_prefix() {
        assert_eq!(detect_wire_format("claude-3-5-sonnet", "https://api.openai.com/v1"), WireFormat::Claude);
    }

    #[test]
    fn detects_claude_by_api_base() {
        assert_eq!(detect_wire_format("my-model", "https://api.anthropic.com/v1"), WireFormat::Claude);
    }

    #[test]
    fn defaults_to_openai() {
        assert_eq!(detect_wire_format("gpt-4o-mini", "https://api.openai.com/v1"), WireFormat::OpenAi);
    }
}
