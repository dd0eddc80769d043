//! Per-message token estimation used by both trimming strategies:
//! 4 bytes/token plus 4 tokens of framing overhead per message.

use conductor_core::message::Message;

const BYTES_PER_TOKEN: usize = 4;
const FRAMING_TOKENS: u64 = 4;

pub fn estimate_tokens(message: &Message) -> u64 {
    (message.byte_len() / BYTES_PER_TOKEN) as u64 + FRAMING_TOKENS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_framing_overhead_to_byte_estimate() {
        let m = Message::user("abcdefgh"); // 8 bytes -> 2 tokens + 4 framing
        assert_eq!(estimate_tokens(&m), 6);
    }
}
