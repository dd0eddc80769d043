//! Four-level circuit breaker / rate limit hierarchy:
//!
//! 1. [`fuse::FuseRegistry`] — per-skill circuit breaker
//! 2. [`counters::AgentCallCounter`] — per-agent skill-call budget
//! 3. [`counters::TurnCounters`] — per-turn agent-dispatch and skill-call budgets
//! 4. [`conversation_window::ConversationWindow`] — per-conversation sliding window

mod conversation_window;
mod counters;
mod error;
mod fuse;
mod window;

pub use conversation_window::ConversationWindow;
pub use counters::{AgentCallCounter, TurnCounters};
pub use error::{LimitErrorAtom, LimitExceeded};
pub use fuse::{FuseConfig, FuseRegistry, FuseState};
pub use window::{SlidingWindow, WindowExceeded};

use conductor_core::config::LimitsConfig;

/// Builds the per-turn and per-agent defaults plus the shared fuse registry
/// from a loaded `LimitsConfig`. Call once at engine construction and share
/// the `FuseRegistry` across every sub-agent worker it spawns.
pub fn fuse_registry_from_config(config: &LimitsConfig) -> FuseRegistry {
    FuseRegistry::new(FuseConfig {
        threshold: config.fuse_threshold,
        window: std::time::Duration::from_millis(config.fuse_window_ms),
    })
}

pub fn conversation_window_from_config(config: &LimitsConfig) -> ConversationWindow {
    ConversationWindow::new(config.conversation_window_max_calls, config.conversation_window_ms)
}

pub fn turn_counters_from_config(config: &LimitsConfig) -> TurnCounters {
    TurnCounters::new(config.max_agents_per_turn, config.max_skill_calls_per_turn)
}

pub fn agent_call_counter_from_config(config: &LimitsConfig) -> AgentCallCounter {
    AgentCallCounter::new(config.max_tool_calls_per_agent)
}
