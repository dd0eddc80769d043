//! Error atoms surfaced to the LLM as tool-result text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitExceeded {
    pub used: usize,
    pub max: usize,
}

impl std::fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "limit exceeded: {} of {} used", self.used, self.max)
    }
}

impl std::error::Error for LimitExceeded {}

/// Stable error-atom identifiers, matching table, used as the
/// Nudger's hint-table lookup key (`conductor-nudge`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitErrorAtom {
    CircuitBreakerOpen,
    LimitExceeded,
}

impl LimitErrorAtom {
    pub fn as_str(self) -> &'static str {
        match self {
            LimitErrorAtom::CircuitBreakerOpen => "circuit_breaker_open",
            LimitErrorAtom::LimitExceeded => "limit_exceeded",
        }
    }
}
