//! Levels 2 and 3: per-agent and per-turn counters.
//! Unlike the fuse and conversation window, these are plain monotonic
//! counters owned by the sub-agent/engine loop state, not shared.

use super::LimitExceeded;

/// Level 2: `{calls, max}` owned by a single sub-agent's loop state.
#[derive(Debug, Clone, Copy)]
pub struct AgentCallCounter {
    calls: usize,
    max: usize,
}

impl AgentCallCounter {
    pub fn new(max: usize) -> Self {
        Self { calls: 0, max }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Records one skill call, failing if it would push `calls` past `max`.
    pub fn try_record(&mut self) -> Result<(), LimitExceeded> {
        if self.calls + 1 > self.max {
            return Err(LimitExceeded { used: self.calls, max: self.max });
        }
        self.calls += 1;
        Ok(())
    }
}

/// Level 3: `{agents_used, skill_calls_used, max_agents, max_skill_calls}`
/// owned by the engine's per-turn loop state.
#[derive(Debug, Clone, Copy)]
pub struct TurnCounters {
    agents_used: usize,
    skill_calls_used: usize,
    max_agents: usize,
    max_skill_calls: usize,
}

impl TurnCounters {
    pub fn new(max_agents: usize, max_skill_calls: usize) -> Self {
        Self { agents_used: 0, skill_calls_used: 0, max_agents, max_skill_calls }
    }

    /// The orchestrator calls this before dispatching `count` new agents in
    /// a batch.
    pub fn try_dispatch_agents(&mut self, count: usize) -> Result<(), LimitExceeded> {
        if self.agents_used + count > self.max_agents {
            return Err(LimitExceeded { used: self.agents_used, max: self.max_agents });
        }
        self.agents_used += count;
        Ok(())
    }

    /// A sub-agent's skill call increments the shared per-turn budget.
    pub fn try_record_skill_call(&mut self) -> Result<(), LimitExceeded> {
        if self.skill_calls_used + 1 > self.max_skill_calls {
            return Err(LimitExceeded { used: self.skill_calls_used, max: self.max_skill_calls });
        }
        self.skill_calls_used += 1;
        Ok(())
    }

    pub fn agents_used(&self) -> usize {
        self.agents_used
    }

    pub fn skill_calls_used(&self) -> usize {
        self.skill_calls_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_counter_rejects_past_max() {
        let mut c = AgentCallCounter::new(2);
        assert!(c.try_record().is_ok());
        assert!(c.try_record().is_ok());
        let err = c.try_record().unwrap_err();
        assert_eq!(err, LimitExceeded { used: 2, max: 2 });
    }

    #[test]
    fn turn_counters_track_agents_and_skill_calls_independently() {
        let mut t = TurnCounters::new(2, 3);
        assert!(t.try_dispatch_agents(2).is_ok());
        assert!(t.try_dispatch_agents(1).is_err());
        assert!(t.try_record_skill_call().is_ok());
        assert!(t.try_record_skill_call().is_ok());
        assert!(t.try_record_skill_call().is_ok());
        assert!(t.try_record_skill_call().is_err());
    }
}
