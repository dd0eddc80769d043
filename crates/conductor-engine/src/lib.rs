//! Engine: the per-conversation outer LLM loop, orchestrator tool routing,
//! and the conversation-scoped sub-agent supervisor.

mod deps;
mod events;
mod prompt;
mod run;
mod state;
mod supervisor;
mod tools;

pub use deps::EngineDeps;
pub use events::{EngineEvent, EVENT_CHANNEL_CAPACITY};
pub use run::{Engine, EngineReply, OPAQUE_ERROR_MESSAGE, PROCESSING_LIMIT_MESSAGE, STALL_MESSAGE};
pub use state::{EngineSnapshot, Mode};
pub use supervisor::{ResumeOutcome, WaitMode};
