//! Level 4: per-conversation sliding window.

use std::time::{Duration, Instant};

use super::window::SlidingWindow;
use super::LimitExceeded;

/// Ring of recent call timestamps; default 50 calls / 5 minutes.
pub struct ConversationWindow {
    window: SlidingWindow,
}

impl ConversationWindow {
    pub fn new(max_calls: usize, window_ms: u64) -> Self {
        Self { window: SlidingWindow::new(max_calls, Duration::from_millis(window_ms)) }
    }

    /// Checks and, on success, records one call at `now`. Callers pass the
    /// current instant explicitly so the stall check is deterministic to
    /// test.
    pub fn try_admit(&mut self, now: Instant) -> Result<(), LimitExceeded> {
        self.window.try_record(1, now).map_err(|e| LimitExceeded { used: e.used, max: e.max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stalls_the_fourth_rapid_message_under_a_three_call_window() {
        let mut w = ConversationWindow::new(3, 60_000);
        let now = Instant::now();
        assert!(w.try_admit(now).is_ok());
        assert!(w.try_admit(now).is_ok());
        assert!(w.try_admit(now).is_ok());
        let err = w.try_admit(now).unwrap_err();
        assert_eq!(err, LimitExceeded { used: 3, max: 3 });
    }
}
