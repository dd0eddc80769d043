//! The sub-agent's inner loop and its `spawn` entry point.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::task::JoinHandle;

use conductor_core::config::ModelsConfig;
use conductor_core::dispatch::{AgentResult, AgentUpdate, DispatchParams};
use conductor_core::message::Message;
use conductor_core::skill::{HandlerContext, HandlerRegistry, SkillRegistry};
use conductor_limits::{AgentCallCounter, FuseRegistry, FuseState, TurnCounters};
use conductor_llm::{ChatOptions, LlmClient};

use crate::context_files::{load_context_files, ContextFileError};
use crate::handle::SubAgentHandle;
use crate::prompt::{dependency_summary, identity_and_rules};
use crate::tool_surface::tool_surface;

/// Bounds the synchronous-in-intent `execute` operation. Mirrors `conductor_scheduler::WAVE_TIMEOUT`
/// deliberately: both describe the same top-level 120 s bound, viewed from
/// the scheduler's and the sub-agent's own side respectively.
pub const WATCHDOG: Duration = Duration::from_secs(120);

/// Default bound on a `request_help` pause.
pub const RESUME_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A generous ceiling on inner-loop round-trips, guarding against a model
/// that keeps emitting rejected or malformed tool calls without ever
/// consuming its `max_tool_calls` budget. Not part of the core data model;
/// a defensive bound only.
const MAX_INNER_ITERATIONS: usize = 50;

fn default_max_context_tokens() -> u64 {
    128_000
}

/// Collaborators a sub-agent worker needs, bundled so `spawn`'s signature
/// stays stable as the set of dependencies grows (mirrors the Engine's own
/// `deps` bundle).
pub struct SubAgentDeps {
    pub llm: Arc<dyn LlmClient>,
    pub sentinel_llm: Arc<dyn LlmClient>,
    pub skills: Arc<dyn SkillRegistry>,
    pub handlers: Arc<dyn HandlerRegistry>,
    pub fuses: Arc<FuseRegistry>,
    pub models: Arc<ModelsConfig>,
    pub context_base_dir: PathBuf,
    pub handler_context: HandlerContext,
    /// The user's original top-level request, when available to this agent.
    pub original_request: Option<String>,
    /// Level 3 of the limits hierarchy, shared across
    /// every sub-agent dispatched in the same turn so `use_skill` calls
    /// count against one per-turn budget regardless of which agent makes
    /// them.
    pub turn_counters: Arc<std::sync::Mutex<TurnCounters>>,
}

/// Starts a sub-agent worker and returns a cloneable handle (for
/// `get_status`/`resume`) alongside the `JoinHandle` the caller's
/// `WorkerSupervisor` awaits for the terminal `AgentResult`.
pub fn spawn(
    dispatch: DispatchParams,
    dep_results: HashMap<String, AgentResult>,
    deps: SubAgentDeps,
) -> (SubAgentHandle, JoinHandle<AgentResult>) {
    let handle = SubAgentHandle::new();
    let handle_for_task = handle.clone();
    let join = tokio::spawn(async move {
        let result = tokio::time::timeout(WATCHDOG, run(dispatch, dep_results, deps, handle_for_task.clone()))
            .await
            .unwrap_or_else(|_| AgentResult::timeout(WATCHDOG.as_millis() as u64));
        handle_for_task.mark_terminal(result.status.is_terminal() && !result.status.is_failure());
        result
    });
    (handle, join)
}

async fn run(
    dispatch: DispatchParams,
    dep_results: HashMap<String, AgentResult>,
    deps: SubAgentDeps,
    handle: SubAgentHandle,
) -> AgentResult {
    let started = Instant::now();

    let model = deps.models.resolve_model("sub_agent", dispatch.model_override.as_deref()).unwrap_or_default();
    let max_context_tokens = deps.models.max_context_tokens(&model).unwrap_or_else(default_max_context_tokens);
    let limits = &deps.models.limits;
    let full_budget = conductor_context::token_budget(max_context_tokens, limits.context_utilization_target, limits.response_reserve_tokens);
    // Halved to leave room for the conversation body.
    let context_budget = full_budget / 2;

    let loaded_files = match load_context_files(&deps.context_base_dir, &dispatch.context_files, context_budget) {
        Ok(files) => files,
        Err(ContextFileError::BudgetExceeded { budget, total_estimated, breakdown }) => {
            tracing::warn!(agent_id = %dispatch.agent_id, budget, total_estimated, "context_budget_exceeded");
            let names: Vec<String> = breakdown.iter().map(|(p, t)| format!("{p}={t}")).collect();
            return AgentResult::failed(
                format!("context_budget_exceeded: needed {total_estimated} tokens, budget is {budget} ({})", names.join(", ")),
                started.elapsed().as_millis() as u64,
            );
        }
        Err(ContextFileError::PathEscape(msg)) => {
            tracing::error!(agent_id = %dispatch.agent_id, error = %msg, "context file path escape rejected");
            return AgentResult::failed(format!("invalid context file path: {msg}"), started.elapsed().as_millis() as u64);
        }
    };
    let context_file_bodies: Vec<(String, String)> = loaded_files.into_iter().map(|f| (f.path, f.content)).collect();

    let mut granted: HashSet<String> = dispatch.skills.clone();
    let mut counter = AgentCallCounter::new(dispatch.max_tool_calls);
    let mut history: Vec<Message> = vec![Message::user(dispatch.mission.clone())];
    let dep_summary = dependency_summary(&dep_results);

    for _ in 0..MAX_INNER_ITERATIONS {
        let mut granted_sorted: Vec<String> = granted.iter().cloned().collect();
        granted_sorted.sort();
        let skill_markdown = deps.skills.markdown_for(&granted_sorted);
        let identity = identity_and_rules(&context_file_bodies, &skill_markdown);

        let messages = conductor_context::assemble(conductor_context::AssembleRequest {
            identity_and_rules: &identity,
            skill_domains: &[],
            memory_snippets: None,
            task_summary: dep_summary.as_deref(),
            history: &history,
            max_context_tokens,
            utilization_target: limits.context_utilization_target,
            response_reserve_tokens: limits.response_reserve_tokens,
            usage_baseline: None,
        });

        let tools = tool_surface(&granted_sorted);
        let options = ChatOptions::new(model.clone()).with_tools(tools);

        let response = match deps.llm.chat(&messages, &options).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(agent_id = %dispatch.agent_id, error = %e, "sub-agent llm call failed");
                return AgentResult::failed(format!("llm error: {e}"), started.elapsed().as_millis() as u64);
            }
        };

        let (text, calls) = match response {
            conductor_core::message::LlmResponse::Text { content, .. } => (Some(content), Vec::new()),
            conductor_core::message::LlmResponse::ToolCalls { content, calls, .. } => (content, calls),
        };

        if calls.is_empty() {
            let result = text.unwrap_or_default();
            return AgentResult::completed(result, counter.calls(), started.elapsed().as_millis() as u64);
        }

        let assistant_text = text.clone();
        history.push(Message::assistant_tool_calls(text, calls.clone()));

        let mut limit_hit = false;
        let mut paused: Option<AgentResult> = None;
        let mut last_text = assistant_text.clone();

        for call in &calls {
            if paused.is_some() {
                break;
            }
            match call.name.as_str() {
                "use_skill" => {
                    let tool_call_limit_hint = || {
                        let mut details = HashMap::new();
                        details.insert("used".to_string(), counter.calls().to_string());
                        details.insert("max".to_string(), counter.max().to_string());
                        conductor_nudge::global().format_error("limit_exceeded: tool call limit reached", "limit_exceeded", &details)
                    };
                    // Scope is checked before the counter is charged: a call
                    // naming a non-granted skill is rejected for free, it
                    // never burns the agent's tool-call budget.
                    let tool_result = match resolve_granted_skill(&call.arguments, &granted) {
                        Err(rejection) => rejection,
                        Ok(_) if limit_hit => tool_call_limit_hint(),
                        Ok(_) => {
                            if counter.try_record().is_err() {
                                limit_hit = true;
                                tool_call_limit_hint()
                            } else {
                                handle_use_skill(&dispatch, &deps, &granted, call.arguments.clone()).await
                            }
                        }
                    };
                    history.push(Message::tool_result(call.id.clone(), tool_result));
                }
                "request_help" => {
                    let reason = call.arguments.get("reason").and_then(Value::as_str).unwrap_or("no reason given").to_string();
                    let rx = handle.begin_pause(reason, history.clone());
                    match tokio::time::timeout(RESUME_TIMEOUT, rx).await {
                        Ok(Ok(update)) => {
                            handle.end_pause();
                            apply_resume_update(&deps, &mut granted, &update, &mut history).await;
                            history.push(Message::tool_result(call.id.clone(), update.message.unwrap_or_else(|| "(no message)".to_string())));
                        }
                        Ok(Err(_)) | Err(_) => {
                            paused = Some(AgentResult::failed("timed out awaiting orchestrator", started.elapsed().as_millis() as u64));
                        }
                    }
                }
                other => {
                    history.push(Message::tool_result(call.id.clone(), format!("unknown tool: {other}")));
                }
            }
        }

        if let Some(result) = paused {
            return result;
        }

        if limit_hit {
            let partial = last_text.unwrap_or_else(|| "tool call limit reached; partial work only".to_string());
            return AgentResult::completed(partial, counter.calls(), started.elapsed().as_millis() as u64);
        }
    }

    AgentResult::failed("sub-agent exceeded its inner iteration bound", started.elapsed().as_millis() as u64)
}

/// Resolves the proposed skill name out of a `use_skill` call's arguments
/// and checks it against `granted`, returning the name on success or a
/// rejection message otherwise. Called both as the run loop's pre-charge
/// gate (so a rejected call never touches the per-agent counter) and again
/// at the top of `handle_use_skill` — the schema's enum restriction and this
/// set-membership recheck are the scope enforcement's two independent
/// gates.
fn resolve_granted_skill(arguments: &Value, granted: &HashSet<String>) -> Result<String, String> {
    let skill_name = match arguments.get("skill").and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => return Err("skill_not_found: missing 'skill' field".to_string()),
    };
    if !granted.contains(&skill_name) {
        let mut allowed: Vec<&String> = granted.iter().collect();
        allowed.sort();
        return Err(format!(
            "skill_not_found: '{skill_name}' is not in your granted skills. Allowed: {}",
            allowed.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        ));
    }
    Ok(skill_name)
}

async fn handle_use_skill(
    dispatch: &DispatchParams,
    deps: &SubAgentDeps,
    granted: &HashSet<String>,
    arguments: Value,
) -> String {
    let skill_name = match resolve_granted_skill(&arguments, granted) {
        Ok(name) => name,
        Err(rejection) => return rejection,
    };
    let skill_args = arguments.get("arguments").cloned().unwrap_or_else(|| Value::Object(Default::default()));

    if deps.fuses.check(&skill_name) == FuseState::Open {
        let mut details = HashMap::new();
        details.insert("skill".to_string(), skill_name.clone());
        return conductor_nudge::global().format_error(
            &format!("circuit_breaker_open: '{skill_name}' is unavailable right now, try a different approach"),
            "circuit_breaker_open",
            &details,
        );
    }

    if let Err(e) = deps.turn_counters.lock().expect("turn counters mutex poisoned").try_record_skill_call() {
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
        deps.sentinel_llm.as_ref(),
        &conductor_sentinel::resolve_model(&deps.models.defaults),
        conductor_sentinel::ClassifyInput {
            original_request: deps.original_request.as_deref(),
            mission: &dispatch.mission,
            action: conductor_sentinel::ProposedAction { skill_name: &skill_name, arguments: &skill_args, agent_id: &dispatch.agent_id },
        },
    )
    .await;

    if let conductor_sentinel::Decision::Rejected { reason } = decision {
        return format!("rejected by security gate: {reason}");
    }

    let Some(handler) = deps.handlers.get(&skill_name) else {
        return format!("skill_not_found: '{skill_name}' has no registered handler");
    };

    match handler.execute(&skill_args, &deps.handler_context).await {
        Ok(output) => {
            deps.fuses.record_success(&skill_name);
            output.content
        }
        Err(e) => {
            deps.fuses.record_failure(&skill_name);
            format!("skill execution failed: {e}")
        }
    }
}

async fn apply_resume_update(
    deps: &SubAgentDeps,
    granted: &mut HashSet<String>,
    update: &AgentUpdate,
    history: &mut Vec<Message>,
) {
    if let Some(new_skills) = &update.skills {
        let added: Vec<String> = new_skills.difference(granted).cloned().collect();
        if !added.is_empty() {
            let bodies = deps.skills.markdown_for(&added);
            let mut extra = String::from("Newly granted skills:\n");
            for (name, markdown) in &bodies {
                extra.push_str(&format!("\n# {name}\n{markdown}\n"));
            }
            history.push(Message::user(extra));
        }
        granted.extend(new_skills.iter().cloned());
    }

    if let Some(paths) = &update.context_files {
        match load_context_files(&deps.context_base_dir, paths, u64::MAX) {
            Ok(files) if !files.is_empty() => {
                let mut extra = String::from("Newly provided context:\n");
                for f in files {
                    extra.push_str(&format!("\n## {}\n{}\n", f.path, f.content));
                }
                history.push(Message::user(extra));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to load resume context files, ignoring"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conductor_core::message::{LlmResponse, ToolCall, Usage};
    use conductor_core::skill::{HandlerError, HandlerOutput, SkillDoc, SkillHandler, StaticHandlerRegistry, StaticSkillRegistry};
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<std::collections::VecDeque<LlmResponse>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<LlmResponse>) -> Self {
            Self { responses: Mutex::new(responses.into_iter().collect()) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, _messages: &[Message], _options: &ChatOptions) -> Result<LlmResponse, conductor_llm::LlmError> {
            Ok(self.responses.lock().unwrap().pop_front().unwrap_or(LlmResponse::Text { content: String::new(), usage: Usage::default() }))
        }
    }

    struct EchoHandler;

    #[async_trait]
    impl SkillHandler for EchoHandler {
        async fn execute(&self, flags: &Value, _context: &HandlerContext) -> Result<HandlerOutput, HandlerError> {
            Ok(HandlerOutput { status: "ok".to_string(), content: format!("handled {flags}"), ..Default::default() })
        }
    }

    fn dispatch(max_tool_calls: usize, skills: &[&str]) -> DispatchParams {
        DispatchParams {
            agent_id: "cal".to_string(),
            mission: "list today".to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            depends_on: HashSet::new(),
            max_tool_calls,
            context_files: Vec::new(),
            model_override: None,
            context: None,
        }
    }

    fn skill_registry() -> Arc<dyn SkillRegistry> {
        let mut r = StaticSkillRegistry::new();
        r.insert(SkillDoc {
            name: "calendar.list".to_string(),
            domain: "calendar".to_string(),
            description: "List events".to_string(),
            markdown: "# calendar.list\nLists events.".to_string(),
        });
        Arc::new(r)
    }

    fn handler_registry() -> Arc<dyn HandlerRegistry> {
        let mut r = StaticHandlerRegistry::new();
        r.insert("calendar.list", Arc::new(EchoHandler));
        Arc::new(r)
    }

    fn deps_with(llm: Arc<dyn LlmClient>, sentinel_approves: bool) -> SubAgentDeps {
        let sentinel_llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm::new(vec![LlmResponse::Text {
            content: if sentinel_approves {
                r#"{"decision":"approve","reason":"ok"}"#.to_string()
            } else {
                r#"{"decision":"reject","reason":"out of scope"}"#.to_string()
            },
            usage: Usage::default(),
        }]));
        SubAgentDeps {
            llm,
            sentinel_llm,
            skills: skill_registry(),
            handlers: handler_registry(),
            fuses: Arc::new(FuseRegistry::new(conductor_limits::FuseConfig { threshold: 5, window: Duration::from_secs(60) })),
            models: Arc::new(ModelsConfig::default()),
            context_base_dir: std::env::temp_dir(),
            handler_context: HandlerContext::default(),
            original_request: Some("what's on my calendar".to_string()),
            turn_counters: Arc::new(std::sync::Mutex::new(TurnCounters::new(10, 50))),
        }
    }

    fn tool_call(name: &str, arguments: Value) -> ToolCall {
        ToolCall { id: uuid::Uuid::new_v4().to_string(), name: name.to_string(), arguments }
    }

    #[tokio::test]
    async fn simple_ask_tell_executes_one_skill_then_completes() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmResponse::ToolCalls {
                content: None,
                calls: vec![tool_call("use_skill", serde_json::json!({"skill": "calendar.list", "arguments": {"date": "today"}}))],
                usage: Usage::default(),
            },
            LlmResponse::Text { content: "Here's today's calendar.".to_string(), usage: Usage::default() },
        ]));
        let deps = deps_with(llm, true);
        let handle = SubAgentHandle::new();
        let result = run(dispatch(5, &["calendar.list"]), HashMap::new(), deps, handle).await;

        assert_eq!(result.status, conductor_core::dispatch::AgentStatus::Completed);
        assert_eq!(result.tool_calls_used, 1);
        assert!(result.result.contains("today's calendar"));
    }

    #[tokio::test]
    async fn tool_call_limit_stops_at_max_with_partial_result() {
        let calls = vec![
            tool_call("use_skill", serde_json::json!({"skill": "calendar.list", "arguments": {}})),
            tool_call("use_skill", serde_json::json!({"skill": "calendar.list", "arguments": {}})),
            tool_call("use_skill", serde_json::json!({"skill": "calendar.list", "arguments": {}})),
        ];
        let llm = Arc::new(ScriptedLlm::new(vec![LlmResponse::ToolCalls { content: None, calls, usage: Usage::default() }]));
        let deps = deps_with(llm, true);
        let handle = SubAgentHandle::new();
        let result = run(dispatch(2, &["calendar.list"]), HashMap::new(), deps, handle).await;

        assert_eq!(result.status, conductor_core::dispatch::AgentStatus::Completed);
        assert_eq!(result.tool_calls_used, 2);
    }

    #[tokio::test]
    async fn disallowed_skill_is_rejected_without_calling_the_handler() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmResponse::ToolCalls {
                content: None,
                calls: vec![tool_call("use_skill", serde_json::json!({"skill": "email.send", "arguments": {}}))],
                usage: Usage::default(),
            },
            LlmResponse::Text { content: "done".to_string(), usage: Usage::default() },
        ]));
        let deps = deps_with(llm, true);
        let handle = SubAgentHandle::new();
        let result = run(dispatch(5, &["calendar.list"]), HashMap::new(), deps, handle).await;
        assert_eq!(result.status, conductor_core::dispatch::AgentStatus::Completed);
        assert_eq!(result.tool_calls_used, 0);
    }

    #[tokio::test]
    async fn sentinel_rejection_blocks_execution_without_consuming_the_fuse() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmResponse::ToolCalls {
                content: None,
                calls: vec![tool_call("use_skill", serde_json::json!({"skill": "calendar.list", "arguments": {}}))],
                usage: Usage::default(),
            },
            LlmResponse::Text { content: "done".to_string(), usage: Usage::default() },
        ]));
        let deps = deps_with(llm, false);
        let fuses = deps.fuses.clone();
        let handle = SubAgentHandle::new();
        let result = run(dispatch(5, &["calendar.list"]), HashMap::new(), deps, handle).await;
        assert_eq!(result.status, conductor_core::dispatch::AgentStatus::Completed);
        assert_eq!(fuses.check("calendar.list"), FuseState::Closed);
    }

    #[tokio::test]
    async fn pause_resume_unblocks_the_loop_and_widens_scope() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmResponse::ToolCalls {
                content: None,
                calls: vec![tool_call("request_help", serde_json::json!({"reason": "need shared drive id"}))],
                usage: Usage::default(),
            },
            LlmResponse::Text { content: "done with drive access".to_string(), usage: Usage::default() },
        ]));
        let deps = deps_with(llm, true);
        let handle = SubAgentHandle::new();
        let handle_for_resumer = handle.clone();

        let resumer = tokio::spawn(async move {
            loop {
                if handle_for_resumer.get_status().state == crate::handle::RunState::AwaitingOrchestrator {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let mut skills = HashSet::new();
            skills.insert("drive.search".to_string());
            handle_for_resumer
                .resume(AgentUpdate { message: Some("use drive X".to_string()), skills: Some(skills), context_files: None })
                .unwrap();
        });

        let result = run(dispatch(5, &["calendar.list"]), HashMap::new(), deps, handle).await;
        resumer.await.unwrap();

        assert_eq!(result.status, conductor_core::dispatch::AgentStatus::Completed);
        assert!(result.result.contains("drive access"));
    }
}
