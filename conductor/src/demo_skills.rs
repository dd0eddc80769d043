//! A small illustrative skill registry + handler set, wired at harness
//! startup so the engine has something to call `get_skill`/`use_skill`/
//! dispatched sub-agents against. Real deployments would load these from a
//! skill store instead.

use std::sync::Arc;

use async_trait::async_trait;
use conductor_core::skill::{
    HandlerContext, HandlerError, HandlerOutput, SkillDoc, SkillHandler, StaticHandlerRegistry, StaticSkillRegistry,
};
use serde_json::Value;

struct EchoTimeHandler;

#[async_trait]
impl SkillHandler for EchoTimeHandler {
    async fn execute(&self, _flags: &Value, _context: &HandlerContext) -> Result<HandlerOutput, HandlerError> {
        Ok(HandlerOutput {
            status: "ok".to_string(),
            content: chrono::Utc::now().to_rfc3339(),
            ..Default::default()
        })
    }
}

struct NotesListHandler;

#[async_trait]
impl SkillHandler for NotesListHandler {
    async fn execute(&self, _flags: &Value, _context: &HandlerContext) -> Result<HandlerOutput, HandlerError> {
        Ok(HandlerOutput {
            status: "ok".to_string(),
            content: "no notes yet".to_string(),
            ..Default::default()
        })
    }
}

struct NotesCreateHandler;

#[async_trait]
impl SkillHandler for NotesCreateHandler {
    async fn execute(&self, flags: &Value, _context: &HandlerContext) -> Result<HandlerOutput, HandlerError> {
        let text = flags.get("text").and_then(Value::as_str).ok_or_else(|| {
            HandlerError::Failed("notes.create requires a 'text' argument".to_string())
        })?;
        Ok(HandlerOutput { status: "ok".to_string(), content: format!("noted: {text}"), ..Default::default() })
    }
}

/// Builds the demo skill/handler registries shared by the harness.
pub fn build() -> (Arc<StaticSkillRegistry>, Arc<StaticHandlerRegistry>) {
    let mut skills = StaticSkillRegistry::new();
    skills.insert(SkillDoc {
        name: "time.now".to_string(),
        domain: "time".to_string(),
        description: "Current UTC time".to_string(),
        markdown: "# time.now\nReturns the current UTC time as an RFC3339 string. Read-only.".to_string(),
    });
    skills.insert(SkillDoc {
        name: "notes.list".to_string(),
        domain: "notes".to_string(),
        description: "List saved notes".to_string(),
        markdown: "# notes.list\nLists every saved note. Read-only.".to_string(),
    });
    skills.insert(SkillDoc {
        name: "notes.create".to_string(),
        domain: "notes".to_string(),
        description: "Create a note".to_string(),
        markdown: "# notes.create\nCreates a note.\n\nArguments:\n- `text` (string, required)".to_string(),
    });

    let mut handlers = StaticHandlerRegistry::new();
    handlers.insert("time.now", Arc::new(EchoTimeHandler));
    handlers.insert("notes.list", Arc::new(NotesListHandler));
    handlers.insert("notes.create", Arc::new(NotesCreateHandler));

    (Arc::new(skills), Arc::new(handlers))
}
