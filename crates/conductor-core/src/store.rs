//! Persistent conversation state is an external collaborator: engines
//! reload their history from it on restart rather than persisting anything
//! themselves. The core never reads it during the hot path of a turn — only
//! at engine construction and after a turn completes.

use crate::message::Message;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Loads and saves one conversation's message history by id. A real
/// deployment backs this with the persistent message store; this crate only
/// defines the interface the Engine is constructed against.
pub trait ConversationStore: Send + Sync {
    /// Full history for `conversation_id`, oldest first. Empty for an
    /// unknown id rather than an error — a brand-new conversation has no
    /// prior turns to reload.
    fn load(&self, conversation_id: &str) -> Vec<Message>;

    /// Replaces the stored history for `conversation_id` with `messages`.
    fn save(&self, conversation_id: &str, messages: &[Message]);
}

/// An in-process store with no durability, for tests and any caller that
/// does not need history to survive past the current run.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<String, Vec<Message>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn load(&self, conversation_id: &str) -> Vec<Message> {
        self.conversations.lock().expect("conversation store mutex poisoned").get(conversation_id).cloned().unwrap_or_default()
    }

    fn save(&self, conversation_id: &str, messages: &[Message]) {
        self.conversations
            .lock()
            .expect("conversation store mutex poisoned")
            .insert(conversation_id.to_string(), messages.to_vec());
    }
}

/// A directory of `<conversation_id>.json` files, one JSON array of messages
/// each. Sufficient for a CLI harness exercising one conversation across
/// process restarts; a real deployment would back `ConversationStore` with
/// its own message store instead.
pub struct JsonFileConversationStore {
    dir: PathBuf,
}

impl JsonFileConversationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, conversation_id: &str) -> PathBuf {
        let safe: String = conversation_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl ConversationStore for JsonFileConversationStore {
    fn load(&self, conversation_id: &str) -> Vec<Message> {
        let path = self.path_for(conversation_id);
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse stored conversation, starting empty");
            Vec::new()
        })
    }

    fn save(&self, conversation_id: &str, messages: &[Message]) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to create conversation store directory");
            return;
        }
        let path = self.path_for(conversation_id);
        match serde_json::to_string_pretty(messages) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to persist conversation history");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize conversation history"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_round_trips() {
        let store = InMemoryConversationStore::new();
        assert!(store.load("conv-1").is_empty());
        store.save("conv-1", &[Message::user("hi"), Message::assistant("hello")]);
        let loaded = store.load("conv-1");
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn json_file_store_round_trips_across_instances() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileConversationStore::new(tmp.path());
        store.save("conv-1", &[Message::user("hi")]);

        let reopened = JsonFileConversationStore::new(tmp.path());
        let loaded = reopened.load("conv-1");
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn json_file_store_sanitizes_conversation_id_into_a_path() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileConversationStore::new(tmp.path());
        store.save("weird/../id", &[Message::user("hi")]);
        assert!(!tmp.path().join("weird").exists());
    }

    #[test]
    fn unknown_conversation_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileConversationStore::new(tmp.path());
        assert!(store.load("never-saved").is_empty());
    }
}
