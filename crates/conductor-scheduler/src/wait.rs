//! The wait primitive, used by the Engine to
//! implement `get_agent_results`'s `wait_any`/`wait_all` modes against
//! previously dispatched, still in-flight sub-agent workers.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;

use conductor_core::dispatch::AgentResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    WaitAny,
    WaitAll,
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Observes `tasks`, a map of in-flight worker handles owned by the caller
/// (typically the Engine's conversation-scoped supervisor), and waits on the
/// named `ids` per `mode`:
///
/// - `WaitAny`: returns as soon as any named worker has a terminal result,
///   or when `timeout` expires. Agents not yet terminal are absent from the
///   returned map.
/// - `WaitAll`: returns once every named worker has terminated, synthesizing
///   `timeout` for any that did not finish in time.
///
/// Handles for agents that finish are removed from `tasks` (a `JoinHandle`
/// can only be awaited once); handles for agents that remain in flight are
/// left in place so a later call can observe them.
pub async fn wait_for_agents(
    tasks: &mut HashMap<String, JoinHandle<AgentResult>>,
    ids: &[String],
    mode: WaitMode,
    timeout: Duration,
) -> HashMap<String, AgentResult> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut out: HashMap<String, AgentResult> = HashMap::new();

    loop {
        for id in ids {
            if out.contains_key(id) {
                continue;
            }
            let finished = tasks.get(id).map(|h| h.is_finished()).unwrap_or(false);
            if finished {
                if let Some(handle) = tasks.remove(id) {
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(join_error) => AgentResult::failed(format!("agent crashed: {join_error}"), 0),
                    };
                    out.insert(id.clone(), result);
                }
            }
        }

        let satisfied = match mode {
            WaitMode::WaitAny => !out.is_empty(),
            WaitMode::WaitAll => ids.iter().all(|id| out.contains_key(id)),
        };
        if satisfied || tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    if mode == WaitMode::WaitAll {
        for id in ids {
            out.entry(id.clone()).or_insert_with(|| AgentResult::timeout(timeout.as_millis() as u64));
        }
    }

    out
}
