//! CLI harness binary: wires the `conductor-*` crates into one running
//! `Engine` and drives a single conversation from stdin, one line per turn.

mod cli;
mod demo_skills;
mod observability;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use conductor_core::config::{LlmConfig, ModelsConfig, ObservabilityConfig};
use conductor_core::store::{ConversationStore, JsonFileConversationStore};
use conductor_engine::{Engine, EngineDeps};
use conductor_llm::HttpLlmClient;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let obs_config = ObservabilityConfig::from_env();
    observability::init_tracing(&obs_config);

    let nudges_path = conductor_core::config::env_optional(
        conductor_core::config::env_keys::paths::NUDGES_FILE,
        &[],
    )
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("nudges.yaml"));
    conductor_nudge::install(conductor_nudge::NudgeTable::load(&nudges_path)?);

    let models = Arc::new(ModelsConfig::load(&PathBuf::from(&cli.config))?);
    let llm_config = LlmConfig::from_env();

    let sentinel_model = conductor_core::config::env_optional(
        conductor_core::config::env_keys::llm::SENTINEL_MODEL,
        &[],
    )
    .unwrap_or_else(|| llm_config.model.clone());

    tracing::info!(
        conversation_id = %cli.conversation_id,
        model = %llm_config.model,
        sentinel_model = %sentinel_model,
        "starting conductor harness"
    );

    let llm = Arc::new(HttpLlmClient::new(llm_config.api_base.clone(), llm_config.api_key.clone()));
    let sentinel_llm = Arc::new(HttpLlmClient::new(llm_config.api_base, llm_config.api_key));

    let (skills, handlers) = demo_skills::build();
    let fuses = Arc::new(conductor_limits::fuse_registry_from_config(&models.limits));

    let context_base_dir = conductor_core::config::env_optional(
        conductor_core::config::env_keys::paths::CONTEXT_FILES_ROOT,
        &[],
    )
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("."));

    let deps = Arc::new(EngineDeps {
        llm,
        sentinel_llm,
        skills,
        handlers,
        fuses,
        models,
        context_base_dir,
        credentials: HashMap::new(),
    });

    let store = JsonFileConversationStore::new("conversations");
    let history = store.load(&cli.conversation_id);
    let history_len = history.len();

    let engine = Engine::new(cli.conversation_id.clone(), cli.user_id, cli.channel, cli.mode.into(), deps);
    if !history.is_empty() {
        engine.seed_history(history).await;
        tracing::info!(messages = history_len, "restored prior conversation history");
    }

    println!("conductor ready. Type a message and press enter; Ctrl-D to exit.");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let reply = engine.send_message(line).await;
        println!("{}", reply.text());

        store.save(&cli.conversation_id, &engine.history().await);
    }

    engine.shutdown();
    Ok(())
}
