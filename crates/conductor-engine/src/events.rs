//! Pub/sub for token usage and turn completion.
//! Backed by `tokio::sync::broadcast`: many-producer/many-consumer,
//! lossy-on-back-pressure by design, so a slow subscriber never blocks the
//! engine.

use conductor_core::message::Usage;

/// Default channel capacity. A subscriber that falls more than this many
/// events behind starts missing the oldest ones (`RecvError::Lagged`) rather
/// than ever stalling the broadcaster.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    TokenUsage { conversation_id: String, usage: Usage },
    TurnCompleted { conversation_id: String, iteration_count: usize },
}
