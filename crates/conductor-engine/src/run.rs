//! The Engine's outer loop and tool routing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex as AsyncMutex};

use conductor_core::dispatch::{AgentResult, AgentStatus, AgentUpdate, DispatchParams};
use conductor_core::message::{LlmResponse, Message, ToolCall};
use conductor_core::skill::HandlerContext;
use conductor_limits::FuseState;
use conductor_llm::ChatOptions;
use conductor_scheduler::SchedulerError;

use crate::deps::EngineDeps;
use crate::events::{EngineEvent, EVENT_CHANNEL_CAPACITY};
use crate::state::{Batch, EngineSnapshot, LoopState, Mode};
use crate::supervisor::{AgentSupervisor, ResumeOutcome, WaitMode};
use crate::tools;

/// Returned to the channel adapter by `send_message`.
#[derive(Debug, Clone)]
pub enum EngineReply {
    Success(String),
    Stalled,
    ProcessingLimitReached,
    Failure(String),
}

impl EngineReply {
    pub fn text(&self) -> &str {
        match self {
            EngineReply::Success(s) => s,
            EngineReply::Stalled => STALL_MESSAGE,
            EngineReply::ProcessingLimitReached => PROCESSING_LIMIT_MESSAGE,
            EngineReply::Failure(s) => s,
        }
    }
}

pub const STALL_MESSAGE: &str = "Let's wait a moment before sending another message.";
pub const PROCESSING_LIMIT_MESSAGE: &str = "I reached my processing limit for this turn.";
/// Shown to the user on a non-retryable LLM transport failure; the real cause is only logged internally.
pub const OPAQUE_ERROR_MESSAGE: &str = "I ran into a problem processing that request.";

const DEFAULT_MAX_CONTEXT_TOKENS: u64 = 128_000;
/// `get_agent_results`'s wait modes default to this when `timeout_ms` is
/// omitted — generous enough for a typical sub-agent mission, short enough
/// that the orchestrator LLM is not left hanging indefinitely.
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 60_000;
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

fn status_atom(status: AgentStatus) -> String {
    serde_json::to_value(status).ok().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_else(|| "unknown".to_string())
}

/// Per-conversation orchestration engine. One instance per
/// active conversation; `send_message` serializes on the conversation's own
/// loop state via an async mutex held for the duration of the call, mirroring
/// "dedicated engine worker that serializes operations on its loop
/// state."
pub struct Engine {
    conversation_id: String,
    mode: Mode,
    deps: Arc<EngineDeps>,
    handler_context: HandlerContext,
    supervisor: Arc<AgentSupervisor>,
    events: broadcast::Sender<EngineEvent>,
    state: AsyncMutex<LoopState>,
}

impl Engine {
    pub fn new(conversation_id: String, user_id: String, channel: String, mode: Mode, deps: Arc<EngineDeps>) -> Self {
        let handler_context =
            HandlerContext { conversation_id: conversation_id.clone(), user_id, channel, credentials: deps.credentials.clone() };
        let supervisor = Arc::new(AgentSupervisor::new(deps.clone(), handler_context.clone()));
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let limits = &deps.models.limits;
        let conversation_window = conductor_limits::conversation_window_from_config(limits);
        let state = LoopState::new(conversation_window, limits.max_agents_per_turn, limits.max_skill_calls_per_turn);
        Self { conversation_id, mode, deps, handler_context, supervisor, events: tx, state: AsyncMutex::new(state) }
    }

    /// Subscribes to this conversation's token-usage/turn-completed events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// `get_state() -> snapshot`.
    pub async fn get_state(&self) -> EngineSnapshot {
        let state = self.state.lock().await;
        EngineSnapshot {
            conversation_id: self.conversation_id.clone(),
            mode: self.mode,
            message_count: state.messages.len(),
            iteration_count: state.iteration_count,
            agents_used: state.turn_counters.lock().expect("turn counters mutex poisoned").agents_used(),
            skill_calls_used: state.turn_counters.lock().expect("turn counters mutex poisoned").skill_calls_used(),
            dispatched_agents: state.dispatched_agents.clone(),
        }
    }

    /// Cascades shutdown to every live sub-agent worker.
    pub fn shutdown(&self) {
        self.supervisor.shutdown();
    }

    /// Replaces this engine's in-memory history, e.g. when a harness
    /// reloads a conversation from its own `ConversationStore` at startup.
    /// Only valid before the first `send_message` call on this instance.
    pub async fn seed_history(&self, messages: Vec<Message>) {
        let mut state = self.state.lock().await;
        state.messages = messages;
    }

    /// A clone of the full message history accumulated so far, for a
    /// harness to persist via its own `ConversationStore`.
    pub async fn history(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }

    /// `send_message(text) -> (text | failure)`. Synchronous in
    /// intent: runs the outer LLM loop until a terminal response or a hard
    /// limit stops it.
    pub async fn send_message(&self, text: impl Into<String>) -> EngineReply {
        let text = text.into();
        let mut state = self.state.lock().await;

        let (max_agents, max_skill_calls, max_iterations) = {
            let l = &self.deps.models.limits;
            (l.max_agents_per_turn, l.max_skill_calls_per_turn, l.max_iterations)
        };
        state.begin_turn(max_agents, max_skill_calls);
        state.messages.push(Message::user(text.clone()));
        self.supervisor.begin_turn(state.turn_counters.clone(), Some(text.clone()));

        for _ in 0..max_iterations {
            if state.conversation_window.try_admit(Instant::now()).is_err() {
                return EngineReply::Stalled;
            }
            state.iteration_count += 1;

            let read_only_skills = self.read_only_skill_names();
            let identity = crate::prompt::identity_and_rules(self.mode);
            let mut skill_domains: Vec<String> = self.deps.skills.domains().into_iter().map(|d| d.domain).collect();
            skill_domains.sort();

            let limits = &self.deps.models.limits;
            let model = self.deps.models.resolve_model("orchestrator", None).unwrap_or_default();
            let max_context_tokens = self.deps.models.max_context_tokens(&model).unwrap_or(DEFAULT_MAX_CONTEXT_TOKENS);
            let usage_baseline = state.last_prompt_tokens.map(|prompt_tokens| {
                conductor_context::UsageBaseline { prompt_tokens, known_count: state.last_message_count }
            });
            let known_count_at_call = state.messages.len();

            let messages = conductor_context::assemble(conductor_context::AssembleRequest {
                identity_and_rules: &identity,
                skill_domains: &skill_domains,
                memory_snippets: None,
                task_summary: None,
                history: &state.messages,
                max_context_tokens,
                utilization_target: limits.context_utilization_target,
                response_reserve_tokens: limits.response_reserve_tokens,
                usage_baseline,
            });

            let tools_for_call = tools::orchestrator_tools(self.mode, &read_only_skills);
            let options = ChatOptions::new(model).with_tools(tools_for_call);

            let response = match self.deps.llm.chat(&messages, &options).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(conversation_id = %self.conversation_id, error = %e, "engine llm call failed");
                    return EngineReply::Failure(OPAQUE_ERROR_MESSAGE.to_string());
                }
            };

            let (text, calls, usage) = match response {
                LlmResponse::Text { content, usage } => (Some(content), Vec::new(), usage),
                LlmResponse::ToolCalls { content, calls, usage } => (content, calls, usage),
            };

            state.last_prompt_tokens = Some(usage.prompt_tokens);
            state.last_message_count = known_count_at_call;

            if calls.is_empty() {
                let reply = text.unwrap_or_default();
                state.messages.push(Message::assistant(reply.clone()));
                let _ = self.events.send(EngineEvent::TokenUsage { conversation_id: self.conversation_id.clone(), usage });
                let _ = self.events.send(EngineEvent::TurnCompleted {
                    conversation_id: self.conversation_id.clone(),
                    iteration_count: state.iteration_count,
                });
                return EngineReply::Success(reply);
            }

            state.messages.push(Message::assistant_tool_calls(text, calls.clone()));
            self.route_tool_calls(&mut state, &calls).await;
        }

        state.messages.push(Message::assistant(PROCESSING_LIMIT_MESSAGE));
        let _ = self.events.send(EngineEvent::TurnCompleted {
            conversation_id: self.conversation_id.clone(),
            iteration_count: state.iteration_count,
        });
        EngineReply::ProcessingLimitReached
    }

    /// Routes one iteration's tool calls: local calls
    /// resolve immediately, `dispatch_agent` calls accumulate into a batch
    /// handed to the scheduler, and at most one `get_agent_results` wait-mode
    /// call is deferred until after the batch has been spawned.
    async fn route_tool_calls(&self, state: &mut LoopState, calls: &[ToolCall]) {
        let mut local_results: Vec<(String, String)> = Vec::new();
        let mut batch: HashMap<String, DispatchParams> = HashMap::new();
        let mut queued_dispatches: Vec<(String, String)> = Vec::new();
        let mut wait_request: Option<(String, Vec<String>, WaitMode, Duration)> = None;
        let original_request = state.messages.first().and_then(|m| m.content.as_ref()).map(|c| c.as_text());

        for call in calls {
            match call.name.as_str() {
                "get_skill" => {
                    let name = call.arguments.get("name").and_then(Value::as_str);
                    let result = tools::handle_get_skill(self.deps.skills.as_ref(), name);
                    local_results.push((call.id.clone(), result));
                }
                "dispatch_agent" => match serde_json::from_value::<DispatchParams>(call.arguments.clone()) {
                    Err(e) => local_results.push((call.id.clone(), format!("invalid_dispatch: {e}"))),
                    Ok(params) => {
                        let agent_id = params.agent_id.clone();
                        if state.dispatched_agents.contains_key(&agent_id)
                            || state.pending_agent_ids.contains(&agent_id)
                            || batch.contains_key(&agent_id)
                        {
                            local_results.push((
                                call.id.clone(),
                                format!("invalid_dispatch: agent_id '{agent_id}' already in use this turn"),
                            ));
                        } else {
                            queued_dispatches.push((call.id.clone(), agent_id.clone()));
                            batch.insert(agent_id, params);
                        }
                    }
                },
                "get_agent_results" => {
                    self.reap_finished_batches(state).await;
                    match serde_json::from_value::<GetAgentResultsArgs>(call.arguments.clone()) {
                        Err(e) => local_results.push((call.id.clone(), format!("invalid_get_agent_results: {e}"))),
                        Ok(args) => match args.wait_mode() {
                            Err(e) => local_results.push((call.id.clone(), e)),
                            Ok(None) => {
                                let text = self.describe_agent_results(state, &args.agent_ids);
                                local_results.push((call.id.clone(), text));
                            }
                            Ok(Some(mode)) if wait_request.is_none() => {
                                let timeout = Duration::from_millis(args.timeout_ms.unwrap_or(DEFAULT_WAIT_TIMEOUT_MS));
                                wait_request = Some((call.id.clone(), args.agent_ids, mode, timeout));
                            }
                            Ok(Some(_)) => {
                                // A second wait-mode call in the same iteration is downgraded
                                // to immediate rather than left without a result.
                                let text = self.describe_agent_results(state, &args.agent_ids);
                                local_results.push((call.id.clone(), text));
                            }
                        },
                    }
                }
                "send_agent_update" => {
                    let result = self.handle_send_agent_update(call.arguments.clone());
                    local_results.push((call.id.clone(), result));
                }
                "use_skill" if self.mode == Mode::SingleLoop => {
                    let result = self.handle_use_skill_direct(state, original_request.as_deref(), call.arguments.clone()).await;
                    local_results.push((call.id.clone(), result));
                }
                other => {
                    local_results.push((call.id.clone(), format!("unknown tool: {other}")));
                }
            }
        }

        if !batch.is_empty() {
            if let Err(err) = conductor_scheduler::plan_waves(&batch) {
                let atom = match err {
                    SchedulerError::UnknownDependency(_) => "unknown_dependency",
                    SchedulerError::CycleDetected => "cycle_detected",
                };
                let text = format!("{atom}: {err}");
                for (call_id, _) in &queued_dispatches {
                    local_results.push((call_id.clone(), text.clone()));
                }
            } else if let Err(e) = state.turn_counters.lock().expect("turn counters mutex poisoned").try_dispatch_agents(batch.len())
            {
                let mut details = HashMap::new();
                details.insert("used".to_string(), e.used.to_string());
                details.insert("max".to_string(), e.max.to_string());
                let text = conductor_nudge::global().format_error(
                    &format!("limit_exceeded: per-turn agent dispatch budget reached ({e})"),
                    "limit_exceeded",
                    &details,
                );
                for (call_id, _) in &queued_dispatches {
                    local_results.push((call_id.clone(), text.clone()));
                }
            } else {
                let ids: Vec<String> = batch.keys().cloned().collect();
                for id in &ids {
                    state.pending_agent_ids.insert(id.clone());
                }
                let supervisor = self.supervisor.clone();
                let join = tokio::spawn(async move { conductor_scheduler::execute(batch, supervisor.as_ref()).await });
                state.batch_tasks.push(Batch { agent_ids: ids, join });
                for (call_id, agent_id) in &queued_dispatches {
                    local_results.push((call_id.clone(), format!("agent '{agent_id}' dispatched")));
                }
            }
        }

        for (call_id, result) in local_results {
            state.messages.push(Message::tool_result(call_id, result));
        }

        if let Some((call_id, ids, mode, timeout)) = wait_request {
            let result = self.resolve_wait(state, &ids, mode, timeout).await;
            state.messages.push(Message::tool_result(call_id, result));
        }
    }

    /// Reaps any background dispatch batches that have finished, merging
    /// their results into `dispatched_agents`.
    async fn reap_finished_batches(&self, state: &mut LoopState) {
        let pending = std::mem::take(&mut state.batch_tasks);
        let mut still_running = Vec::with_capacity(pending.len());
        for batch in pending {
            if !batch.join.is_finished() {
                still_running.push(batch);
                continue;
            }
            match batch.join.await {
                Ok(Ok(results)) => {
                    for (agent_id, result) in results {
                        state.pending_agent_ids.remove(&agent_id);
                        self.supervisor.forget(&agent_id);
                        state.dispatched_agents.insert(agent_id, result);
                    }
                }
                Ok(Err(scheduler_err)) => {
                    for agent_id in batch.agent_ids {
                        state.pending_agent_ids.remove(&agent_id);
                        self.supervisor.forget(&agent_id);
                        state
                            .dispatched_agents
                            .entry(agent_id)
                            .or_insert_with(|| AgentResult::failed(format!("scheduler error: {scheduler_err}"), 0));
                    }
                }
                Err(join_error) => {
                    for agent_id in batch.agent_ids {
                        state.pending_agent_ids.remove(&agent_id);
                        self.supervisor.forget(&agent_id);
                        state
                            .dispatched_agents
                            .entry(agent_id)
                            .or_insert_with(|| AgentResult::failed(format!("scheduler batch crashed: {join_error}"), 0));
                    }
                }
            }
        }
        state.batch_tasks = still_running;
    }

    /// Blocks (bounded by `timeout`) on the named agents per `mode`,
    /// reaping finished batches as it polls.
    async fn resolve_wait(&self, state: &mut LoopState, ids: &[String], mode: WaitMode, timeout: Duration) -> String {
        let deadline = Instant::now() + timeout;
        loop {
            self.reap_finished_batches(state).await;
            let satisfied = match mode {
                WaitMode::WaitAny => ids.iter().any(|id| state.dispatched_agents.contains_key(id)),
                WaitMode::WaitAll => ids.iter().all(|id| state.dispatched_agents.contains_key(id)),
            };
            if satisfied || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }

        if mode == WaitMode::WaitAll {
            for id in ids {
                if !state.dispatched_agents.contains_key(id) {
                    state.pending_agent_ids.remove(id);
                    self.supervisor.forget(id);
                    state.dispatched_agents.insert(id.clone(), AgentResult::timeout(timeout.as_millis() as u64));
                }
            }
        }

        // wait_any leaves still-pending ids out of the response entirely
        //: only report the ones that actually have a result.
        let reportable: Vec<&String> = match mode {
            WaitMode::WaitAny => ids.iter().filter(|id| state.dispatched_agents.contains_key(*id)).collect(),
            WaitMode::WaitAll => ids.iter().collect(),
        };
        if reportable.is_empty() {
            return "no agent finished before the wait timeout".to_string();
        }
        let mut lines: Vec<String> = reportable.iter().map(|id| self.describe_agent_status(state, id)).collect();
        lines.sort();
        lines.join("\n")
    }

    fn describe_agent_results(&self, state: &LoopState, ids: &[String]) -> String {
        let mut lines: Vec<String> = ids.iter().map(|id| self.describe_agent_status(state, id)).collect();
        lines.sort();
        lines.join("\n")
    }

    fn describe_agent_status(&self, state: &LoopState, id: &str) -> String {
        if let Some(r) = state.dispatched_agents.get(id) {
            format!("{id}: {} — {} (tool_calls_used={}, duration_ms={})", status_atom(r.status), r.result, r.tool_calls_used, r.duration_ms)
        } else if let Some(snapshot) = self.supervisor.status(id) {
            format!("{id}: {}", crate::supervisor::describe_live_status(&snapshot))
        } else if state.pending_agent_ids.contains(id) {
            format!("{id}: pending (dispatched, not yet started)")
        } else {
            format!("{id}: not_found: no such agent_id")
        }
    }

    fn handle_send_agent_update(&self, arguments: Value) -> String {
        match serde_json::from_value::<SendAgentUpdateArgs>(arguments) {
            Err(e) => format!("invalid_send_agent_update: {e}"),
            Ok(args) => {
                let update = AgentUpdate { message: args.message, skills: args.skills, context_files: args.context_files };
                match self.supervisor.resume(&args.agent_id, update) {
                    ResumeOutcome::Ok => format!("agent '{}' update delivered", args.agent_id),
                    ResumeOutcome::NotAwaiting => {
                        format!("not_awaiting: agent '{}' is not currently awaiting orchestrator input", args.agent_id)
                    }
                    ResumeOutcome::NotFound => format!("not_found: no such agent '{}'", args.agent_id),
                }
            }
        }
    }

    /// `single_loop` mode's direct skill execution,
    /// gated the same way a sub-agent's `use_skill` is: an enum-restricted
    /// tool schema plus a handler-side set-membership recheck, the per-turn
    /// skill-call budget, the per-skill fuse, and the Sentinel.
    async fn handle_use_skill_direct(&self, state: &LoopState, original_request: Option<&str>, arguments: Value) -> String {
        let read_only = self.read_only_skill_names();
        let skill_name = match arguments.get("skill").and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => return "skill_not_found: missing 'skill' field".to_string(),
        };
        let skill_args = arguments.get("arguments").cloned().unwrap_or_else(|| Value::Object(Default::default()));

        if !read_only.contains(&skill_name) {
            return format!("skill_not_found: '{skill_name}' is not available for direct use. Allowed: {}", read_only.join(", "));
        }

        if self.deps.fuses.check(&skill_name) == FuseState::Open {
            let mut details = HashMap::new();
            details.insert("skill".to_string(), skill_name.clone());
            return conductor_nudge::global().format_error(
                &format!("circuit_breaker_open: '{skill_name}' is unavailable right now, try a different approach"),
                "circuit_breaker_open",
                &details,
            );
        }

        if let Err(e) = state.turn_counters.lock().expect("turn counters mutex poisoned").try_record_skill_call() {
            let mut details = HashMap::new();
            details.insert("used".to_string(), e.used.to_string());
            details.insert("max".to_string(), e.max.to_string());
            return conductor_nudge::global().format_error(
                &format!("limit_exceeded: per-turn skill call budget reached ({e})"),
                "limit_exceeded",
                &details,
            );
        }

        let decision = conductor_sentinel::classify(
            self.deps.sentinel_llm.as_ref(),
            &conductor_sentinel::resolve_model(&self.deps.models.defaults),
            conductor_sentinel::ClassifyInput {
                original_request,
                mission: "direct orchestrator skill use (single_loop mode)",
                action: conductor_sentinel::ProposedAction { skill_name: &skill_name, arguments: &skill_args, agent_id: "orchestrator" },
            },
        )
        .await;

        if let conductor_sentinel::Decision::Rejected { reason } = decision {
            return format!("rejected by security gate: {reason}");
        }

        let Some(handler) = self.deps.handlers.get(&skill_name) else {
            return format!("skill_not_found: '{skill_name}' has no registered handler");
        };

        match handler.execute(&skill_args, &self.handler_context).await {
            Ok(output) => {
                self.deps.fuses.record_success(&skill_name);
                output.content
            }
            Err(e) => {
                self.deps.fuses.record_failure(&skill_name);
                format!("skill execution failed: {e}")
            }
        }
    }

    /// Skills whose name carries a read-only suffix.
    fn read_only_skill_names(&self) -> Vec<String> {
        const READ_ONLY_SUFFIXES: [&str; 4] = [".search", ".list", ".get", ".read"];
        let mut names: Vec<String> = self
            .deps
            .skills
            .domains()
            .into_iter()
            .flat_map(|d| d.skills)
            .filter(|name| READ_ONLY_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[derive(Debug, Deserialize)]
struct GetAgentResultsArgs {
    agent_ids: Vec<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

impl GetAgentResultsArgs {
    fn wait_mode(&self) -> Result<Option<WaitMode>, String> {
        match self.mode.as_deref() {
            None | Some("immediate") => Ok(None),
            Some("wait_any") => Ok(Some(WaitMode::WaitAny)),
            Some("wait_all") => Ok(Some(WaitMode::WaitAll)),
            Some(other) => Err(format!("invalid_get_agent_results: unknown mode '{other}'")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendAgentUpdateArgs {
    agent_id: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    skills: Option<HashSet<String>>,
    #[serde(default)]
    context_files: Option<Vec<String>>,
}
