//! Environment variable name constants, grouped by domain.
//!
//! Primary variables use the `CONDUCTOR_*` prefix; a handful of common
//! aliases (`OPENAI_*`) are accepted for convenience when wiring against an
//! OpenAI-compatible endpoint.

/// LLM client configuration.
pub mod llm {
    pub const API_BASE: &str = "CONDUCTOR_API_BASE";
    pub const API_BASE_ALIASES: &[&str] = &["OPENAI_API_BASE", "OPENAI_BASE_URL"];

    pub const API_KEY: &str = "CONDUCTOR_API_KEY";
    pub const API_KEY_ALIASES: &[&str] = &["OPENAI_API_KEY"];

    pub const MODEL: &str = "CONDUCTOR_MODEL";
    pub const MODEL_ALIASES: &[&str] = &["OPENAI_MODEL"];

    pub const SENTINEL_MODEL: &str = "CONDUCTOR_SENTINEL_MODEL";
    pub const COMPACTION_MODEL: &str = "CONDUCTOR_COMPACTION_MODEL";
    pub const SUB_AGENT_MODEL: &str = "CONDUCTOR_SUB_AGENT_MODEL";
}

/// Workspace and config-file paths.
pub mod paths {
    pub const CONFIG_FILE: &str = "CONDUCTOR_CONFIG_FILE";
    pub const NUDGES_FILE: &str = "CONDUCTOR_NUDGES_FILE";
    pub const CONTEXT_FILES_ROOT: &str = "CONDUCTOR_CONTEXT_FILES_ROOT";
}

/// Four-level limits and context-budget tuning.
pub mod limits {
    pub const CONTEXT_UTILIZATION_TARGET: &str = "CONDUCTOR_CONTEXT_UTILIZATION_TARGET";
    pub const RESPONSE_RESERVE_TOKENS: &str = "CONDUCTOR_RESPONSE_RESERVE_TOKENS";
    pub const MAX_ITERATIONS: &str = "CONDUCTOR_MAX_ITERATIONS";
    pub const MAX_AGENTS_PER_TURN: &str = "CONDUCTOR_MAX_AGENTS_PER_TURN";
    pub const MAX_SKILL_CALLS_PER_TURN: &str = "CONDUCTOR_MAX_SKILL_CALLS_PER_TURN";
    pub const MAX_TOOL_CALLS_PER_AGENT: &str = "CONDUCTOR_MAX_TOOL_CALLS_PER_AGENT";
    pub const CONVERSATION_WINDOW_MAX_CALLS: &str = "CONDUCTOR_CONVERSATION_WINDOW_MAX_CALLS";
    pub const CONVERSATION_WINDOW_MS: &str = "CONDUCTOR_CONVERSATION_WINDOW_MS";
    pub const FUSE_THRESHOLD: &str = "CONDUCTOR_FUSE_THRESHOLD";
    pub const FUSE_WINDOW_MS: &str = "CONDUCTOR_FUSE_WINDOW_MS";
}

/// Observability.
pub mod observability {
    pub const LOG_LEVEL: &str = "CONDUCTOR_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &["RUST_LOG"];
    pub const LOG_JSON: &str = "CONDUCTOR_LOG_JSON";
}
