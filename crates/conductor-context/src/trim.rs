//! History trimming: usage-based when a prior call's actual
//! `prompt_tokens` is known, pure estimation otherwise. Both strategies
//! preserve the newest suffix intact so tool-call/tool-result pairs stay
//! contiguous.

use conductor_core::message::Message;

use super::estimate::estimate_tokens;

/// A prior call's observed `prompt_tokens`, paired with the message count at
/// the time it was measured.
#[derive(Debug, Clone, Copy)]
pub struct UsageBaseline {
    pub prompt_tokens: u64,
    pub known_count: usize,
}

/// Trims `messages` to fit `budget` tokens. `baseline` is `None` on the
/// first iteration of a turn, or when the prior baseline no longer applies
/// (e.g. the history shrank below `known_count`).
pub fn trim_history(messages: &[Message], budget: u64, baseline: Option<UsageBaseline>) -> Vec<Message> {
    match baseline {
        Some(baseline) if baseline.known_count <= messages.len() => trim_usage_based(messages, budget, baseline),
        _ => trim_pure_estimation(messages, budget),
    }
}

fn trim_usage_based(messages: &[Message], budget: u64, baseline: UsageBaseline) -> Vec<Message> {
    let new_messages = &messages[baseline.known_count..];
    let new_cost: u64 = new_messages.iter().map(estimate_tokens).sum();

    if baseline.prompt_tokens.saturating_add(new_cost) <= budget {
        return messages.to_vec();
    }

    // Drop oldest known messages, re-estimating each one's own cost to
    // whittle down the known-prefix total, until the deficit is covered.
    let mut known_cost = baseline.prompt_tokens;
    let mut drop_from = 0;
    while drop_from < baseline.known_count && known_cost.saturating_add(new_cost) > budget {
        known_cost = known_cost.saturating_sub(estimate_tokens(&messages[drop_from]));
        drop_from += 1;
    }
    messages[drop_from..].to_vec()
}

fn trim_pure_estimation(messages: &[Message], budget: u64) -> Vec<Message> {
    let mut kept = Vec::new();
    let mut total = 0u64;
    for message in messages.iter().rev() {
        let cost = estimate_tokens(message);
        if total + cost > budget {
            break;
        }
        total += cost;
        kept.push(message.clone());
    }
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize) -> Vec<Message> {
        (0..n).map(|i| Message::user(format!("message {i}"))).collect()
    }

    #[test]
    fn usage_based_sends_whole_history_when_under_budget() {
        let messages = history(5);
        let baseline = UsageBaseline { prompt_tokens: 100, known_count: 3 };
        let out = trim_history(&messages, 10_000, Some(baseline));
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn usage_based_drops_oldest_known_messages_first_never_new_suffix() {
        let messages = history(5);
        let baseline = UsageBaseline { prompt_tokens: 1_000_000, known_count: 3 };
        let out = trim_history(&messages, 20, Some(baseline));
        // The 2 "new" messages (index 3, 4) must always survive.
        assert!(out.len() <= 2);
        for m in &out {
            assert!(m.content.as_ref().unwrap().as_text().contains("message 3") || m.content.as_ref().unwrap().as_text().contains("message 4"));
        }
    }

    #[test]
    fn falls_back_to_pure_estimation_when_known_count_exceeds_history() {
        let messages = history(2);
        let baseline = UsageBaseline { prompt_tokens: 100, known_count: 10 };
        let out = trim_history(&messages, 10_000, Some(baseline));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn pure_estimation_keeps_newest_messages_first() {
        let messages = history(10);
        let out = trim_pure_estimation(&messages, 12); // ~1 message worth of budget
        assert!(out.len() <= 2);
        if let Some(last) = out.last() {
            assert!(last.content.as_ref().unwrap().as_text().contains("message 9"));
        }
    }
}
