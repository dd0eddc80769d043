//! Shared sub-agent handle: the Engine's view into a running sub-agent
//! worker, independent of the `tokio::task::JoinHandle<AgentResult>` the
//! Scheduler's `WorkerSupervisor` awaits. Cloneable so the Engine can hold it
//! for `get_status`/`resume` calls while the worker task itself runs to
//! completion elsewhere.

use std::sync::{Arc, Mutex};

use conductor_core::dispatch::AgentUpdate;
use conductor_core::message::Message;
use tokio::sync::oneshot;

use crate::error::ResumeError;

/// Live run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    AwaitingOrchestrator,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub state: RunState,
    pub awaiting_reason: Option<String>,
    pub awaiting_partial_history: Option<Vec<Message>>,
}

struct StateInner {
    run_state: RunState,
    awaiting_reason: Option<String>,
    partial_history: Vec<Message>,
    resume_tx: Option<oneshot::Sender<AgentUpdate>>,
}

struct Inner {
    state: Mutex<StateInner>,
}

/// Cloneable handle to one running sub-agent's pause/resume state.
#[derive(Clone)]
pub struct SubAgentHandle {
    inner: Arc<Inner>,
}

impl Default for SubAgentHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SubAgentHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(StateInner {
                    run_state: RunState::Running,
                    awaiting_reason: None,
                    partial_history: Vec::new(),
                    resume_tx: None,
                }),
            }),
        }
    }

    /// `get_status(agent_id) -> snapshot`.
    pub fn get_status(&self) -> StatusSnapshot {
        let s = self.inner.state.lock().expect("sub-agent handle mutex poisoned");
        StatusSnapshot {
            state: s.run_state,
            awaiting_reason: s.awaiting_reason.clone(),
            awaiting_partial_history: (s.run_state == RunState::AwaitingOrchestrator)
                .then(|| s.partial_history.clone()),
        }
    }

    /// Called by the run loop when pausing on `request_help`. Returns the
    /// receiver half the loop then awaits, bounded by the resume timeout.
    pub(crate) fn begin_pause(&self, reason: String, partial_history: Vec<Message>) -> oneshot::Receiver<AgentUpdate> {
        let (tx, rx) = oneshot::channel();
        let mut s = self.inner.state.lock().expect("sub-agent handle mutex poisoned");
        s.run_state = RunState::AwaitingOrchestrator;
        s.awaiting_reason = Some(reason);
        s.partial_history = partial_history;
        s.resume_tx = Some(tx);
        rx
    }

    pub(crate) fn end_pause(&self) {
        let mut s = self.inner.state.lock().expect("sub-agent handle mutex poisoned");
        s.run_state = RunState::Running;
        s.awaiting_reason = None;
        s.resume_tx = None;
    }

    pub(crate) fn mark_terminal(&self, completed: bool) {
        let mut s = self.inner.state.lock().expect("sub-agent handle mutex poisoned");
        s.run_state = if completed { RunState::Completed } else { RunState::Failed };
    }

    /// `resume(agent_id, update) -> ok | not-awaiting`.
    pub fn resume(&self, update: AgentUpdate) -> Result<(), ResumeError> {
        let mut s = self.inner.state.lock().expect("sub-agent handle mutex poisoned");
        if s.run_state != RunState::AwaitingOrchestrator {
            return Err(ResumeError::NotAwaiting);
        }
        let tx = s.resume_tx.take().ok_or(ResumeError::NotAwaiting)?;
        tx.send(update).map_err(|_| ResumeError::NotAwaiting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        let h = SubAgentHandle::new();
        assert_eq!(h.get_status().state, RunState::Running);
    }

    #[test]
    fn resume_before_pause_is_not_awaiting() {
        let h = SubAgentHandle::new();
        let err = h.resume(AgentUpdate { message: None, skills: None, context_files: None }).unwrap_err();
        assert_eq!(err, ResumeError::NotAwaiting);
    }

    #[tokio::test]
    async fn resume_delivers_the_update_to_the_pending_receiver() {
        let h = SubAgentHandle::new();
        let rx = h.begin_pause("need a drive id".to_string(), vec![Message::user("hi")]);
        assert_eq!(h.get_status().state, RunState::AwaitingOrchestrator);
        assert_eq!(h.get_status().awaiting_reason.as_deref(), Some("need a drive id"));

        h.resume(AgentUpdate { message: Some("use drive X".to_string()), skills: None, context_files: None }).unwrap();
        let update = rx.await.unwrap();
        assert_eq!(update.message.as_deref(), Some("use drive X"));
    }

    #[test]
    fn second_resume_after_consumption_is_not_awaiting() {
        let h = SubAgentHandle::new();
        let _rx = h.begin_pause("x".to_string(), Vec::new());
        h.resume(AgentUpdate { message: None, skills: None, context_files: None }).unwrap();
        let err = h.resume(AgentUpdate { message: None, skills: None, context_files: None }).unwrap_err();
        assert_eq!(err, ResumeError::NotAwaiting);
    }
}
