//! Level 1: per-skill circuit breaker.
//!
//! A fuse is `closed -> open` once `record_failure` pushes the failure count
//! within `window_ms` across `threshold`. There is no half-open/reset timer —
//! an open fuse stays open until an operator clears it (see DESIGN.md's Open
//! Question resolution). Fuses are process-wide and keyed by skill name;
//! mutations are serialized by the registry's own lock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::window::SlidingWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuseState {
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy)]
pub struct FuseConfig {
    pub threshold: u32,
    pub window: Duration,
}

struct Fuse {
    config: FuseConfig,
    failures: SlidingWindow,
    state: FuseState,
}

impl Fuse {
    fn new(config: FuseConfig) -> Self {
        Self { failures: SlidingWindow::new(config.threshold as usize, config.window), config, state: FuseState::Closed }
    }

    fn record_failure(&mut self, now: Instant) {
        self.failures.force_record(now);
        if self.failures.current_count(now) >= self.config.threshold as usize {
            self.state = FuseState::Open;
        }
    }

    fn record_success(&mut self) {
        // Successes don't reset an already-open fuse (no auto half-open);
        // they simply stop contributing further failures.
    }
}

/// Process-wide registry of per-skill fuses. Construct one per process and
/// share it (e.g. behind an `Arc`) across every sub-agent worker.
#[derive(Default)]
pub struct FuseRegistry {
    fuses: Mutex<HashMap<String, Fuse>>,
    default_config: Option<FuseConfig>,
}

impl FuseRegistry {
    pub fn new(default_config: FuseConfig) -> Self {
        Self { fuses: Mutex::new(HashMap::new()), default_config: Some(default_config) }
    }

    fn default_config(&self) -> FuseConfig {
        self.default_config.unwrap_or(FuseConfig { threshold: 5, window: Duration::from_secs(60) })
    }

    /// Current state of the named skill's fuse, creating it closed on first
    /// use.
    pub fn check(&self, skill: &str) -> FuseState {
        let mut fuses = self.fuses.lock().expect("fuse registry mutex poisoned");
        let config = self.default_config();
        fuses.entry(skill.to_string()).or_insert_with(|| Fuse::new(config)).state
    }

    pub fn record_success(&self, skill: &str) {
        let mut fuses = self.fuses.lock().expect("fuse registry mutex poisoned");
        let config = self.default_config();
        fuses.entry(skill.to_string()).or_insert_with(|| Fuse::new(config)).record_success();
    }

    pub fn record_failure(&self, skill: &str) {
        let mut fuses = self.fuses.lock().expect("fuse registry mutex poisoned");
        let config = self.default_config();
        fuses.entry(skill.to_string()).or_insert_with(|| Fuse::new(config)).record_failure(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FuseRegistry {
        FuseRegistry::new(FuseConfig { threshold: 2, window: Duration::from_secs(60) })
    }

    #[test]
    fn starts_closed() {
        let r = registry();
        assert_eq!(r.check("email.send"), FuseState::Closed);
    }

    #[test]
    fn opens_after_threshold_failures() {
        let r = registry();
        r.record_failure("email.send");
        assert_eq!(r.check("email.send"), FuseState::Closed);
        r.record_failure("email.send");
        assert_eq!(r.check("email.send"), FuseState::Open);
    }

    #[test]
    fn stays_open_after_a_success_is_recorded() {
        let r = registry();
        r.record_failure("email.send");
        r.record_failure("email.send");
        assert_eq!(r.check("email.send"), FuseState::Open);
        r.record_success("email.send");
        assert_eq!(r.check("email.send"), FuseState::Open);
    }

    #[test]
    fn fuses_are_independent_per_skill() {
        let r = registry();
        r.record_failure("email.send");
        r.record_failure("email.send");
        assert_eq!(r.check("email.send"), FuseState::Open);
        assert_eq!(r.check("calendar.create"), FuseState::Closed);
    }
}
