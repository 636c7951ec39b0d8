//! Typewriter reveal pacing.
//!
//! Reveal is a presentation concern decoupled from network timing: a fast
//! response is not flashed instantly but shown at a bounded rate. Modeled as
//! a pure function of (text, elapsed ticks) so it is testable offline.

pub const DEFAULT_REVEAL_SPEED: usize = 15;

/// Prefix of `text` visible after `ticks` ticks at `chars_per_tick`.
/// Counts characters, not bytes, so multibyte text never splits mid-char.
pub fn revealed_prefix(text: &str, ticks: u64, chars_per_tick: usize) -> &str {
    let budget = (ticks as usize).saturating_mul(chars_per_tick);
    match text.char_indices().nth(budget) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

pub fn is_fully_revealed(text: &str, ticks: u64, chars_per_tick: usize) -> bool {
    let budget = (ticks as usize).saturating_mul(chars_per_tick);
    text.chars().count() <= budget
}

/// Per-session reveal clock. Owned by exactly one session; independent
/// sessions never share a clock.
#[derive(Debug, Clone)]
pub struct RevealClock {
    chars_per_tick: usize,
    ticks: u64,
}

impl RevealClock {
    pub fn new(chars_per_tick: usize) -> Self {
        Self {
            chars_per_tick: chars_per_tick.max(1),
            ticks: 0,
        }
    }

    pub fn advance(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    pub fn revealed<'a>(&self, text: &'a str) -> &'a str {
        revealed_prefix(text, self.ticks, self.chars_per_tick)
    }

    pub fn is_complete(&self, text: &str) -> bool {
        is_fully_revealed(text, self.ticks, self.chars_per_tick)
    }
}

impl Default for RevealClock {
    fn default() -> Self {
        Self::new(DEFAULT_REVEAL_SPEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_grows_by_speed_per_tick() {
        let text = "abcdefghij";
        assert_eq!(revealed_prefix(text, 0, 3), "");
        assert_eq!(revealed_prefix(text, 1, 3), "abc");
        assert_eq!(revealed_prefix(text, 2, 3), "abcdef");
        assert_eq!(revealed_prefix(text, 4, 3), text);
    }

    #[test]
    fn reveal_respects_char_boundaries() {
        let text = "héllo wörld";
        for ticks in 0..=12 {
            // Would panic on a byte split; slicing by char index never does.
            let shown = revealed_prefix(text, ticks, 1);
            assert!(text.starts_with(shown));
        }
        assert_eq!(revealed_prefix(text, 2, 1), "hé");
    }

    #[test]
    fn completion_is_reached_exactly_once_budget_covers_text() {
        let text = "abcdef";
        assert!(!is_fully_revealed(text, 1, 3));
        assert!(is_fully_revealed(text, 2, 3));
        assert!(is_fully_revealed("", 0, 3));
    }

    #[test]
    fn clock_advances_monotonically() {
        let mut clock = RevealClock::new(4);
        let text = "abcdefgh";
        assert_eq!(clock.revealed(text), "");
        clock.advance();
        assert_eq!(clock.revealed(text), "abcd");
        clock.advance();
        assert!(clock.is_complete(text));
    }
}
