//! Foundational data model and configuration layer shared by every
//! conductor crate: conversation messages, dispatch parameters, the skill
//! registry interface, path validation, and env/YAML configuration.

pub mod config;
pub mod dispatch;
pub mod message;
pub mod path_validation;
pub mod skill;
pub mod store;

pub use dispatch::{AgentResult, AgentStatus, AgentUpdate, DispatchParams};
pub use message::{
    CacheTtl, ContentPart, LlmResponse, Message, MessageContent, Role, ToolCall, ToolDefinition,
    Usage,
};
pub use path_validation::{validate_path_under_root, PathValidationError};
pub use skill::{
    DomainIndex, HandlerContext, HandlerError, HandlerOutput, HandlerRegistry, SkillDoc,
    SkillHandler, SkillRegistry, StaticHandlerRegistry, StaticSkillRegistry,
};
pub use store::{ConversationStore, InMemoryConversationStore, JsonFileConversationStore};
