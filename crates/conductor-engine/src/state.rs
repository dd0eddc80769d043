//! Engine-owned state: everything that lives for the
//! duration of a conversation or is reset each turn.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use conductor_core::dispatch::AgentResult;
use conductor_core::message::Message;
use conductor_limits::{ConversationWindow, TurnCounters};
use conductor_scheduler::SchedulerError;
use tokio::task::JoinHandle;

/// A dispatch batch's background scheduler run.
pub(crate) type BatchJoin = JoinHandle<Result<HashMap<String, AgentResult>, SchedulerError>>;

/// One in-flight dispatch batch: the scheduler's background join handle,
/// paired with the `agent_id`s it covers so a crashed or cancelled batch can
/// still be normalized into per-agent failures (the join result alone loses
/// that membership once it resolves to an `Err`).
pub(crate) struct Batch {
    pub agent_ids: Vec<String>,
    pub join: BatchJoin,
}

/// Tool surface selection. `SingleLoop` is intended for
/// latency-sensitive channels that would rather let the orchestrator read
/// skills directly than pay for a dispatch round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    MultiAgent,
    SingleLoop,
}

/// Read-only diagnostic view returned by `Engine::get_state`.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub conversation_id: String,
    pub mode: Mode,
    pub message_count: usize,
    pub iteration_count: usize,
    pub agents_used: usize,
    pub skill_calls_used: usize,
    pub dispatched_agents: HashMap<String, AgentResult>,
}

/// Per-conversation state. `conversation_window` persists across
/// turns; everything else is reset at the start of `send_message` — for
/// each user message the engine resets per-turn counters and message/agent
/// accumulators.
pub(crate) struct LoopState {
    pub messages: Vec<Message>,
    pub dispatched_agents: HashMap<String, AgentResult>,
    /// Shared with every `SubAgentDeps` built for the current turn's
    /// dispatches.
    pub turn_counters: Arc<std::sync::Mutex<TurnCounters>>,
    pub conversation_window: ConversationWindow,
    pub iteration_count: usize,
    pub last_prompt_tokens: Option<u64>,
    pub last_message_count: usize,
    /// Dispatch batches whose scheduler run is still in flight in the
    /// background; reaped opportunistically by `get_agent_results`.
    pub batch_tasks: Vec<Batch>,
    /// `agent_id`s claimed by a dispatch that hasn't yet landed in
    /// `dispatched_agents` — spans both in-flight batches and agents a batch
    /// task has already returned but `get_agent_results` hasn't reaped yet.
    /// Used to reject duplicate `agent_id`s at dispatch time and to answer
    /// `get_agent_results` for an id whose batch is still running.
    pub pending_agent_ids: HashSet<String>,
}

impl LoopState {
    pub fn new(conversation_window: ConversationWindow, max_agents: usize, max_skill_calls: usize) -> Self {
        Self {
            messages: Vec::new(),
            dispatched_agents: HashMap::new(),
            turn_counters: Arc::new(std::sync::Mutex::new(TurnCounters::new(max_agents, max_skill_calls))),
            conversation_window,
            iteration_count: 0,
            last_prompt_tokens: None,
            last_message_count: 0,
            batch_tasks: Vec::new(),
            pending_agent_ids: HashSet::new(),
        }
    }

    /// Resets everything scoped to a single turn while keeping the
    /// conversation-window counter, which tracks stalls across turns.
    ///
    /// Any batches still in flight from a prior turn are aborted: `dispatched_agents`
    /// is scoped to "across the turn," and an abandoned
    /// background batch has no result slot left to report into once its
    /// turn's state is gone.
    pub fn begin_turn(&mut self, max_agents: usize, max_skill_calls: usize) {
        self.dispatched_agents.clear();
        self.turn_counters = Arc::new(std::sync::Mutex::new(TurnCounters::new(max_agents, max_skill_calls)));
        self.iteration_count = 0;
        for task in self.batch_tasks.drain(..) {
            task.join.abort();
        }
        self.pending_agent_ids.clear();
    }
}
