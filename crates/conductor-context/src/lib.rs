//! Context Assembler: cache-aware system prompt construction,
//! token-budget computation, and usage-based/pure-estimation history
//! trimming.

mod assembler;
mod budget;
mod estimate;
mod system_prompt;
mod tools;
mod trim;

pub use assembler::{assemble, AssembleRequest};
pub use budget::token_budget;
pub use estimate::estimate_tokens;
pub use system_prompt::{build_context_block, build_system_message};
pub use tools::{tool_definitions, ToolSurface};
pub use trim::{trim_history, UsageBaseline};
