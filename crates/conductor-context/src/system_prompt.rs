//! System-message and context-block construction.

use conductor_core::message::{CacheTtl, ContentPart, Message};

/// Identity/rules text plus the sorted skill-domain list, cached long (~1h).
pub fn build_system_message(identity_and_rules: &str, skill_domains: &[String]) -> Message {
    let mut domains = skill_domains.to_vec();
    domains.sort();
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();

    let body = format!(
        "{identity_and_rules}\n\nAvailable skill domains: {}\n\nCurrent date: {today}",
        if domains.is_empty() { "(none)".to_string() } else { domains.join(", ") }
    );

    Message::system_parts(vec![ContentPart::cached(body, CacheTtl::Long)])
}

/// The optional memory/task-summary context block: a cached user message
/// followed by a stub assistant acknowledgement, cached short (~5m). `None`
/// when both inputs are empty.
pub fn build_context_block(memory_snippets: Option<&str>, task_summary: Option<&str>) -> Option<(Message, Message)> {
    let memory_snippets = memory_snippets.unwrap_or("").trim();
    let task_summary = task_summary.unwrap_or("").trim();
    if memory_snippets.is_empty() && task_summary.is_empty() {
        return None;
    }

    let mut body = String::new();
    if !memory_snippets.is_empty() {
        body.push_str("Relevant memory:\n");
        body.push_str(memory_snippets);
    }
    if !task_summary.is_empty() {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str("Task summary:\n");
        body.push_str(task_summary);
    }

    let user = Message::user_parts(vec![ContentPart::cached(body, CacheTtl::Short)]);
    let ack = Message::assistant("Understood, I have the context above.");
    Some((user, ack))
}
