//! Agent Scheduler: resolves a dependency DAG of dispatch
//! requests into parallel waves and executes them under a caller-supplied
//! worker supervisor.

mod error;
mod execute;
mod plan;
mod wait;

pub use error::SchedulerError;
pub use execute::{execute, WorkerSupervisor, WAVE_TIMEOUT};
pub use plan::{flatten, plan_waves};
pub use wait::{wait_for_agents, WaitMode};
