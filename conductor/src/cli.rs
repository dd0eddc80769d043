//! Command-line surface: a single conversation driven from stdin.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(author, version, about = "Conversational orchestration runtime harness", long_about = None)]
pub struct Cli {
    /// Path to the models/limits config file (YAML). Missing file falls back to defaults.
    #[arg(long, env = "CONDUCTOR_CONFIG", default_value = "conductor.yaml")]
    pub config: String,

    /// Tool surface: multi_agent (dispatch_agent/get_agent_results) or
    /// single_loop (adds direct read-only `use_skill`).
    #[arg(long, value_enum, default_value = "multi-agent")]
    pub mode: ModeArg,

    /// Conversation id to tag events/logs with.
    #[arg(long, default_value = "cli-session")]
    pub conversation_id: String,

    #[arg(long, default_value = "cli-user")]
    pub user_id: String,

    #[arg(long, default_value = "cli")]
    pub channel: String,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum ModeArg {
    MultiAgent,
    SingleLoop,
}

impl From<ModeArg> for conductor_engine::Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::MultiAgent => conductor_engine::Mode::MultiAgent,
            ModeArg::SingleLoop => conductor_engine::Mode::SingleLoop,
        }
    }
}
