//! Token-budget computation.

/// Available window = `floor(max_context_tokens * utilization_target) -
/// response_reserve`, lower-bounded at 1,000.
pub fn token_budget(max_context_tokens: u64, utilization_target: f64, response_reserve: u64) -> u64 {
    let usable = (max_context_tokens as f64 * utilization_target).floor() as u64;
    usable.saturating_sub(response_reserve).max(1_000)
}
