//! Scheduler error taxonomy.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("unknown dependency: {0}")]
    UnknownDependency(String),
    #[error("cycle detected in dispatch dependency graph")]
    CycleDetected,
}
