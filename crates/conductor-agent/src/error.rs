//! Sub-agent error taxonomy. These surface only through `AgentResult::result` text — the
//! sub-agent never returns a typed error to its caller; a terminal
//! `AgentResult` is its only output.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeError {
    NotAwaiting,
}

impl std::fmt::Display for ResumeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResumeError::NotAwaiting => write!(f, "not_awaiting"),
        }
    }
}

impl std::error::Error for ResumeError {}
