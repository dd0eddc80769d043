//! Domain-grouped configuration structs, loaded from environment variables
//! and/or the YAML config file.

use super::env_keys::{limits as limit_keys, llm, observability as obv_keys};
use super::loader::{env_bool, env_num, env_optional, env_or};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// LLM API configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            api_base: env_or(llm::API_BASE, llm::API_BASE_ALIASES, || {
                "https://api.openai.com/v1".to_string()
            }),
            api_key: env_or(llm::API_KEY, llm::API_KEY_ALIASES, String::new),
            model: env_or(llm::MODEL, llm::MODEL_ALIASES, || "gpt-4o".to_string()),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_json: bool,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            log_level: env_or(obv_keys::LOG_LEVEL, obv_keys::LOG_LEVEL_ALIASES, || "info".to_string()),
            log_json: env_bool(obv_keys::LOG_JSON, false),
        }
    }
}

/// Four-level Limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Fraction of `max_context_tokens` usable before `response_reserve_tokens` is subtracted.
    pub context_utilization_target: f64,
    pub response_reserve_tokens: u64,
    /// Level 0: outer-loop iteration cap per turn.
    pub max_iterations: usize,
    /// Level 3: per-turn agent dispatch cap.
    pub max_agents_per_turn: usize,
    /// Level 3: per-turn skill-call cap.
    pub max_skill_calls_per_turn: usize,
    /// Level 2: per-agent skill-call cap (dispatch's `max_tool_calls` default).
    pub max_tool_calls_per_agent: usize,
    /// Level 4: sliding-window call cap.
    pub conversation_window_max_calls: usize,
    pub conversation_window_ms: u64,
    /// Level 1: per-skill fuse threshold-over-window.
    pub fuse_threshold: u32,
    pub fuse_window_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            context_utilization_target: 0.85,
            response_reserve_tokens: 4096,
            max_iterations: 10,
            max_agents_per_turn: 8,
            max_skill_calls_per_turn: 40,
            max_tool_calls_per_agent: 5,
            conversation_window_max_calls: 50,
            conversation_window_ms: 5 * 60 * 1000,
            fuse_threshold: 5,
            fuse_window_ms: 60_000,
        }
    }
}

impl LimitsConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let d = Self::default();
        Self {
            context_utilization_target: env_optional(limit_keys::CONTEXT_UTILIZATION_TARGET, &[])
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.context_utilization_target),
            response_reserve_tokens: env_num(limit_keys::RESPONSE_RESERVE_TOKENS, d.response_reserve_tokens),
            max_iterations: env_num(limit_keys::MAX_ITERATIONS, d.max_iterations),
            max_agents_per_turn: env_num(limit_keys::MAX_AGENTS_PER_TURN, d.max_agents_per_turn),
            max_skill_calls_per_turn: env_num(limit_keys::MAX_SKILL_CALLS_PER_TURN, d.max_skill_calls_per_turn),
            max_tool_calls_per_agent: env_num(limit_keys::MAX_TOOL_CALLS_PER_AGENT, d.max_tool_calls_per_agent),
            conversation_window_max_calls: env_num(
                limit_keys::CONVERSATION_WINDOW_MAX_CALLS,
                d.conversation_window_max_calls,
            ),
            conversation_window_ms: env_num(limit_keys::CONVERSATION_WINDOW_MS, d.conversation_window_ms),
            fuse_threshold: env_num(limit_keys::FUSE_THRESHOLD, d.fuse_threshold),
            fuse_window_ms: env_num(limit_keys::FUSE_WINDOW_MS, d.fuse_window_ms),
        }
    }
}

/// A single model's capabilities, as listed in the `models:` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub use_cases: Vec<String>,
    #[serde(default = "default_true")]
    pub supports_tools: bool,
    pub max_context_tokens: u64,
    #[serde(default)]
    pub cost_tier: String,
}

fn default_true() -> bool {
    true
}

/// Role → model-id defaults, as listed in the `defaults:` section of the config file.
pub type RoleDefaults = HashMap<String, String>;

/// The full YAML config file: `defaults`, `models`, `limits`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelsConfig {
    #[serde(default)]
    pub defaults: RoleDefaults,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl ModelsConfig {
    /// Load from a YAML file on disk. Returns `Ok(default)` shaped config if the
    /// file is absent — the kernel must still function with hardcoded role
    /// fallbacks.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Resolve the model id for a role, honoring `model_override` when given.
    pub fn resolve_model(&self, role: &str, model_override: Option<&str>) -> Option<String> {
        model_override
            .map(|s| s.to_string())
            .or_else(|| self.defaults.get(role).cloned())
    }

    /// Look up a model's declared `max_context_tokens`, if known.
    pub fn max_context_tokens(&self, model_id: &str) -> Option<u64> {
        self.models.iter().find(|m| m.id == model_id).map(|m| m.max_context_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_config_has_sane_defaults() {
        let l = LimitsConfig::default();
        assert!(l.context_utilization_target > 0.0 && l.context_utilization_target < 1.0);
        assert_eq!(l.conversation_window_max_calls, 50);
    }

    #[test]
    fn models_config_resolves_override_before_default() {
        let mut cfg = ModelsConfig::default();
        cfg.defaults.insert("sub_agent".to_string(), "gpt-4o".to_string());
        assert_eq!(cfg.resolve_model("sub_agent", Some("gpt-4o-mini")).as_deref(), Some("gpt-4o-mini"));
        assert_eq!(cfg.resolve_model("sub_agent", None).as_deref(), Some("gpt-4o"));
        assert_eq!(cfg.resolve_model("unknown_role", None), None);
    }

    #[test]
    fn models_config_missing_file_yields_default() {
        let cfg = ModelsConfig::load(std::path::Path::new("/nonexistent/conductor.yaml")).unwrap();
        assert!(cfg.defaults.is_empty());
    }
}
