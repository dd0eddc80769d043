//! Skill handler contract. The core never executes side-effectful
//! domain logic directly — it calls through this trait.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Bundles conversation identity, user identity, channel, and per-user
/// credentials for a single handler invocation.
#[derive(Debug, Clone, Default)]
pub struct HandlerContext {
    pub conversation_id: String,
    pub user_id: String,
    pub channel: String,
    /// Opaque per-user credentials (OAuth tokens etc.) — the handler
    /// interprets these; the kernel never reads them.
    pub credentials: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct HandlerOutput {
    pub status: String,
    pub content: String,
    pub side_effects: Option<Value>,
    pub metadata: Option<Value>,
    pub files_produced: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("handler error: {0}")]
    Failed(String),
}

/// A named, domain-specific tool with a handler and documentation.
/// Idempotence is not required — the Sentinel provides coarse safety
/// as defense in depth on top of scope enforcement.
#[async_trait]
pub trait SkillHandler: Send + Sync {
    async fn execute(&self, flags: &Value, context: &HandlerContext) -> Result<HandlerOutput, HandlerError>;
}

/// Name→handler lookup, the execution-side counterpart to [`super::SkillRegistry`]'s
/// name→documentation lookup. Kept as a separate trait since a deployment may
/// want documentation (for LLM-visible `get_skill`) wired independently from
/// execution (e.g. a handler gated behind additional process-level setup).
pub trait HandlerRegistry: Send + Sync {
    fn get(&self, name: &str) -> Option<std::sync::Arc<dyn SkillHandler>>;
}

/// A simple in-memory `HandlerRegistry` backed by a map, sufficient for the
/// harness binary and tests.
#[derive(Default, Clone)]
pub struct StaticHandlerRegistry {
    handlers: std::collections::HashMap<String, std::sync::Arc<dyn SkillHandler>>,
}

impl StaticHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, handler: std::sync::Arc<dyn SkillHandler>) {
        self.handlers.insert(name.into(), handler);
    }
}

impl HandlerRegistry for StaticHandlerRegistry {
    fn get(&self, name: &str) -> Option<std::sync::Arc<dyn SkillHandler>> {
        self.handlers.get(name).cloned()
    }
}
