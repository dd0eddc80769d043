//! The conversation-scoped worker supervisor.
//!
//! Implements `conductor_scheduler::WorkerSupervisor` so the scheduler can
//! spawn workers without depending on `conductor-engine` (avoiding the crate
//! cycle the trait boundary exists to break).
//! Also tracks live `SubAgentHandle`s for `get_status`/`resume`, independent
//! of the scheduler's `wait_for_agents`: that function needs exclusive
//! ownership of raw `JoinHandle`s, which are already consumed by
//! `conductor_scheduler::execute`'s internal `join_wave` once a dispatch
//! batch is handed to it. Since the engine must keep iterating while a batch
//! runs in the background, `run.rs` implements its own bounded poll
//! over this supervisor's handles and the engine's reaped results instead of
//! reusing `wait_for_agents`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use conductor_agent::{RunState, StatusSnapshot, SubAgentHandle};
use conductor_core::dispatch::{AgentResult, AgentUpdate, DispatchParams};
use conductor_core::skill::HandlerContext;
use conductor_limits::TurnCounters;
use conductor_scheduler::WorkerSupervisor;
use tokio::task::{AbortHandle, JoinHandle};

use crate::deps::EngineDeps;

/// `get_agent_results`'s `mode` parameter. The blocking poll loop
/// itself lives in `run.rs`, alongside the `dispatched_agents`/`batch_tasks`
/// state it reaps from — see this module's doc comment for why it can't be
/// `conductor_scheduler::wait_for_agents` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    WaitAny,
    WaitAll,
}

pub enum ResumeOutcome {
    Ok,
    NotAwaiting,
    NotFound,
}

struct TurnContext {
    turn_counters: Arc<Mutex<TurnCounters>>,
    original_request: Option<String>,
}

pub struct AgentSupervisor {
    deps: Arc<EngineDeps>,
    handler_context: HandlerContext,
    handles: Mutex<HashMap<String, SubAgentHandle>>,
    abort_handles: Mutex<HashMap<String, AbortHandle>>,
    turn: Mutex<TurnContext>,
}

impl AgentSupervisor {
    pub fn new(deps: Arc<EngineDeps>, handler_context: HandlerContext) -> Self {
        Self {
            deps,
            handler_context,
            handles: Mutex::new(HashMap::new()),
            abort_handles: Mutex::new(HashMap::new()),
            turn: Mutex::new(TurnContext { turn_counters: Arc::new(Mutex::new(TurnCounters::new(0, 0))), original_request: None }),
        }
    }

    /// Called once at the start of each turn so every agent dispatched
    /// during it shares the same per-turn skill-call budget and Sentinel-visible original request.
    pub fn begin_turn(&self, turn_counters: Arc<Mutex<TurnCounters>>, original_request: Option<String>) {
        *self.turn.lock().expect("supervisor turn mutex poisoned") = TurnContext { turn_counters, original_request };
    }

    /// `get_status(agent_id)`, for `get_agent_results`'s
    /// immediate mode and `send_agent_update`'s validity checks.
    pub fn status(&self, agent_id: &str) -> Option<StatusSnapshot> {
        self.handles.lock().expect("supervisor handles mutex poisoned").get(agent_id).map(|h| h.get_status())
    }

    /// `resume(agent_id, update)`, routed from the engine's
    /// `send_agent_update` tool handler.
    pub fn resume(&self, agent_id: &str, update: AgentUpdate) -> ResumeOutcome {
        let handles = self.handles.lock().expect("supervisor handles mutex poisoned");
        match handles.get(agent_id) {
            None => ResumeOutcome::NotFound,
            Some(handle) => match handle.resume(update) {
                Ok(()) => ResumeOutcome::Ok,
                Err(_) => ResumeOutcome::NotAwaiting,
            },
        }
    }

    /// Drops the tracked handle for an agent once its terminal `AgentResult`
    /// has been reaped into the engine's `dispatched_agents` map.
    pub fn forget(&self, agent_id: &str) {
        self.handles.lock().expect("supervisor handles mutex poisoned").remove(agent_id);
        self.abort_handles.lock().expect("supervisor abort-handles mutex poisoned").remove(agent_id);
    }

    /// Cascades shutdown to every live sub-agent worker. Aborting the
    /// task is a best-effort stop; the scheduler's own `join_wave` already
    /// treats an abandoned worker as `failed`/`timeout` for anyone still
    /// awaiting it.
    pub fn shutdown(&self) {
        let mut aborts = self.abort_handles.lock().expect("supervisor abort-handles mutex poisoned");
        for (_, abort) in aborts.drain() {
            abort.abort();
        }
        self.handles.lock().expect("supervisor handles mutex poisoned").clear();
    }
}

impl WorkerSupervisor for AgentSupervisor {
    fn spawn(&self, agent_id: String, dispatch: DispatchParams, dep_results: HashMap<String, AgentResult>) -> JoinHandle<AgentResult> {
        let (turn_counters, original_request) = {
            let turn = self.turn.lock().expect("supervisor turn mutex poisoned");
            (turn.turn_counters.clone(), turn.original_request.clone())
        };
        let sub_deps = conductor_agent::SubAgentDeps {
            llm: self.deps.llm.clone(),
            sentinel_llm: self.deps.sentinel_llm.clone(),
            skills: self.deps.skills.clone(),
            handlers: self.deps.handlers.clone(),
            fuses: self.deps.fuses.clone(),
            models: self.deps.models.clone(),
            context_base_dir: self.deps.context_base_dir.clone(),
            handler_context: self.handler_context.clone(),
            original_request,
            turn_counters,
        };
        let (handle, join) = conductor_agent::spawn(dispatch, dep_results, sub_deps);
        self.abort_handles.lock().expect("supervisor abort-handles mutex poisoned").insert(agent_id.clone(), join.abort_handle());
        self.handles.lock().expect("supervisor handles mutex poisoned").insert(agent_id, handle);
        join
    }
}

impl Drop for AgentSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Status text for `get_agent_results`'s immediate mode when an agent is
/// still live (not yet in `dispatched_agents`).
pub fn describe_live_status(snapshot: &StatusSnapshot) -> String {
    match snapshot.state {
        RunState::Running => "running".to_string(),
        RunState::AwaitingOrchestrator => {
            format!("awaiting_orchestrator: {}", snapshot.awaiting_reason.as_deref().unwrap_or("no reason given"))
        }
        // `mark_terminal` runs inside the worker itself, slightly ahead of
        // the engine reaping its `AgentResult` out of the background batch
        // join; report the narrow gap honestly rather than as still running.
        RunState::Completed | RunState::Failed => "finishing: result not yet collected".to_string(),
    }
}
