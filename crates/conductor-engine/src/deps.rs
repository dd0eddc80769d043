//! Construction-time collaborators for an [`crate::Engine`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use conductor_core::config::ModelsConfig;
use conductor_core::skill::{HandlerRegistry, SkillRegistry};
use conductor_limits::FuseRegistry;
use conductor_llm::LlmClient;

/// Everything the engine and the sub-agents it dispatches need, gathered in
/// one place so `Engine::new` takes a single bundle rather than a growing
/// parameter list.
pub struct EngineDeps {
    pub llm: Arc<dyn LlmClient>,
    pub sentinel_llm: Arc<dyn LlmClient>,
    pub skills: Arc<dyn SkillRegistry>,
    pub handlers: Arc<dyn HandlerRegistry>,
    pub fuses: Arc<FuseRegistry>,
    pub models: Arc<ModelsConfig>,
    /// Base directory sub-agent context files are resolved and validated against.
    pub context_base_dir: PathBuf,
    /// Per-user credentials folded into the `HandlerContext` built at
    /// construction time (conversation_id/user_id/channel come from
    /// `Engine::new`'s own parameters, not from here).
    pub credentials: HashMap<String, String>,
}
