//! Skill registry and handler interfaces — the boundary to the out-of-scope
//! domain handlers (email/calendar/drive).

mod handler;
mod registry;

pub use handler::{HandlerContext, HandlerError, HandlerOutput, HandlerRegistry, SkillHandler, StaticHandlerRegistry};
pub use registry::{DomainIndex, SkillDoc, SkillRegistry, StaticSkillRegistry};
