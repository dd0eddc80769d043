//! Wave execution and cascading skip.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use conductor_core::dispatch::{AgentResult, DispatchParams};

use crate::error::SchedulerError;
use crate::plan::plan_waves;

/// Bound on how long a single wave may run before stragglers are normalized
/// to `timeout`.
pub const WAVE_TIMEOUT: Duration = Duration::from_secs(120);

/// Spawns one worker per agent in a wave. Implemented by the Engine's
/// conversation-scoped supervisor so the scheduler stays generic over how
/// workers are actually run, avoiding a dependency on `conductor-engine`.
pub trait WorkerSupervisor: Send + Sync {
    fn spawn(
        &self,
        agent_id: String,
        dispatch: DispatchParams,
        dep_results: HashMap<String, AgentResult>,
    ) -> JoinHandle<AgentResult>;
}

/// Plans and executes a dispatch batch to completion: waves run in
/// dependency order, agents within a wave run concurrently, and any agent
/// whose transitive dependency closure intersects a failed/timed-out set is
/// skipped without ever being spawned.
pub async fn execute(
    dispatches: HashMap<String, DispatchParams>,
    supervisor: &dyn WorkerSupervisor,
) -> Result<HashMap<String, AgentResult>, SchedulerError> {
    if dispatches.is_empty() {
        return Ok(HashMap::new());
    }

    let waves = plan_waves(&dispatches)?;
    let mut results: HashMap<String, AgentResult> = HashMap::new();
    let mut failed_ids: HashSet<String> = HashSet::new();
    let mut skip_origins: HashMap<String, HashSet<String>> = HashMap::new();

    for wave in waves {
        propagate_skips(&dispatches, &mut results, &mut skip_origins, &failed_ids);

        let to_run: Vec<String> = wave.into_iter().filter(|id| !results.contains_key(id)).collect();
        if to_run.is_empty() {
            continue;
        }

        let mut handles: HashMap<String, JoinHandle<AgentResult>> = HashMap::with_capacity(to_run.len());
        for agent_id in &to_run {
            let dispatch = dispatches[agent_id].clone();
            let dep_results: HashMap<String, AgentResult> = dispatch
                .depends_on
                .iter()
                .filter_map(|dep| results.get(dep).cloned().map(|r| (dep.clone(), r)))
                .collect();
            tracing::info!(agent_id = %agent_id, "wave starting sub-agent");
            handles.insert(agent_id.clone(), supervisor.spawn(agent_id.clone(), dispatch, dep_results));
        }

        let wave_results = join_wave(handles, WAVE_TIMEOUT).await;
        for (agent_id, result) in wave_results {
            if result.status.is_failure() {
                failed_ids.insert(agent_id.clone());
            }
            results.insert(agent_id, result);
        }
    }

    propagate_skips(&dispatches, &mut results, &mut skip_origins, &failed_ids);

    Ok(results)
}

/// Fixed-point BFS: repeatedly marks not-yet-decided agents as
/// `skipped` when their `depends_on` intersects `failed_ids` or the set of
/// agents already marked skipped, naming the root failed ancestors (not
/// just the immediate dependency) in the result text.
fn propagate_skips(
    dispatches: &HashMap<String, DispatchParams>,
    results: &mut HashMap<String, AgentResult>,
    skip_origins: &mut HashMap<String, HashSet<String>>,
    failed_ids: &HashSet<String>,
) {
    loop {
        let mut changed = false;
        for (agent_id, dispatch) in dispatches {
            if results.contains_key(agent_id) {
                continue;
            }
            let mut origins: HashSet<String> = HashSet::new();
            for dep in &dispatch.depends_on {
                if failed_ids.contains(dep) {
                    origins.insert(dep.clone());
                } else if let Some(existing) = skip_origins.get(dep) {
                    origins.extend(existing.iter().cloned());
                }
            }
            if !origins.is_empty() {
                let mut names: Vec<String> = origins.iter().cloned().collect();
                names.sort();
                results.insert(agent_id.clone(), AgentResult::skipped(&names));
                skip_origins.insert(agent_id.clone(), origins);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Waits for every handle in `handles` up to `timeout`, normalizing abnormal
/// exits to `failed` and stragglers still running at the deadline to
/// `timeout`.
async fn join_wave(
    handles: HashMap<String, JoinHandle<AgentResult>>,
    timeout: Duration,
) -> HashMap<String, AgentResult> {
    let ids: Vec<String> = handles.keys().cloned().collect();
    let mut pending: FuturesUnordered<_> =
        handles.into_iter().map(|(id, handle)| async move { (id, handle.await) }).collect();
    let mut out: HashMap<String, AgentResult> = HashMap::with_capacity(ids.len());

    let sleep = tokio::time::sleep(timeout);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => break,
            next = pending.next() => {
                match next {
                    Some((id, joined)) => {
                        let result = match joined {
                            Ok(result) => result,
                            Err(join_error) => AgentResult::failed(format!("agent crashed: {join_error}"), 0),
                        };
                        out.insert(id, result);
                        if pending.is_empty() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    for id in ids {
        out.entry(id).or_insert_with(|| AgentResult::timeout(timeout.as_millis() as u64));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::dispatch::AgentStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    fn dispatch(agent_id: &str, depends_on: &[&str]) -> DispatchParams {
        DispatchParams {
            agent_id: agent_id.to_string(),
            mission: "test".to_string(),
            skills: Default::default(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            max_tool_calls: 5,
            context_files: Vec::new(),
            model_override: None,
            context: None,
        }
    }

    fn batch(entries: &[(&str, &[&str])]) -> HashMap<String, DispatchParams> {
        entries.iter().map(|(id, deps)| (id.to_string(), dispatch(id, deps))).collect()
    }

    /// A supervisor whose outcome per agent is scripted up front.
    struct ScriptedSupervisor {
        outcomes: HashMap<String, AgentResult>,
        started: Arc<AtomicUsize>,
    }

    impl WorkerSupervisor for ScriptedSupervisor {
        fn spawn(
            &self,
            agent_id: String,
            _dispatch: DispatchParams,
            _dep_results: HashMap<String, AgentResult>,
        ) -> JoinHandle<AgentResult> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let result = self.outcomes.get(&agent_id).cloned().unwrap_or_else(|| AgentResult::completed("ok", 0, 1));
            tokio::spawn(async move {
                tokio::time::sleep(StdDuration::from_millis(1)).await;
                result
            })
        }
    }

    #[tokio::test]
    async fn empty_batch_never_invokes_the_supervisor() {
        let started = Arc::new(AtomicUsize::new(0));
        let supervisor = ScriptedSupervisor { outcomes: HashMap::new(), started: started.clone() };
        let results = execute(HashMap::new(), &supervisor).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn diamond_dependency_runs_b_and_c_concurrently_then_d() {
        let started = Arc::new(AtomicUsize::new(0));
        let supervisor = ScriptedSupervisor { outcomes: HashMap::new(), started: started.clone() };
        let dispatches = batch(&[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])]);
        let results = execute(dispatches, &supervisor).await.unwrap();
        assert_eq!(results.len(), 4);
        for id in ["a", "b", "c", "d"] {
            assert_eq!(results[id].status, AgentStatus::Completed);
        }
        assert_eq!(started.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cascading_failure_skips_transitive_dependents_naming_the_root() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut outcomes = HashMap::new();
        outcomes.insert("a".to_string(), AgentResult::failed("boom", 5));
        let supervisor = ScriptedSupervisor { outcomes, started: started.clone() };

        let dispatches = batch(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]);
        let results = execute(dispatches, &supervisor).await.unwrap();

        assert_eq!(results["a"].status, AgentStatus::Failed);
        assert_eq!(results["b"].status, AgentStatus::Skipped);
        assert_eq!(results["c"].status, AgentStatus::Skipped);
        assert!(results["b"].result.contains('a'));
        assert!(results["c"].result.contains('a'), "c's skip reason should name root failure 'a', got: {}", results["c"].result);
        // b and c are never spawned.
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn diamond_with_one_failed_branch_skips_only_the_dependent_sharing_it() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut outcomes = HashMap::new();
        outcomes.insert("b".to_string(), AgentResult::failed("boom", 5));
        let supervisor = ScriptedSupervisor { outcomes, started: started.clone() };

        let dispatches = batch(&[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])]);
        let results = execute(dispatches, &supervisor).await.unwrap();

        assert_eq!(results["a"].status, AgentStatus::Completed);
        assert_eq!(results["b"].status, AgentStatus::Failed);
        assert_eq!(results["c"].status, AgentStatus::Completed);
        assert_eq!(results["d"].status, AgentStatus::Skipped);
    }
}
