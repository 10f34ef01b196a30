//! Typewriter reveal for streamed content.
//!
//! Pure presentation state: content arrives in bursts but should appear a
//! few characters per tick. The adapter buffers pushed text and meters it
//! out; it never drops or reorders anything, so the visible text is always
//! a prefix of what was pushed.

/// Characters revealed per tick by default.
const DEFAULT_CHARS_PER_TICK: usize = 3;

#[derive(Debug)]
pub struct TypingReveal {
    buffer: String,
    /// Byte offset of the end of the revealed prefix
    revealed: usize,
    chars_per_tick: usize,
}

impl TypingReveal {
    pub fn new() -> Self {
        Self::with_speed(DEFAULT_CHARS_PER_TICK)
    }

    pub fn with_speed(chars_per_tick: usize) -> Self {
        Self {
            buffer: String::new(),
            revealed: 0,
            chars_per_tick: chars_per_tick.max(1),
        }
    }

    /// Queue more streamed text for reveal.
    pub fn push(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Advance one tick, returning the newly revealed slice (None when
    /// everything is already visible).
    pub fn tick(&mut self) -> Option<&str> {
        if self.revealed >= self.buffer.len() {
            return None;
        }
        let start = self.revealed;
        let mut end = start;
        for _ in 0..self.chars_per_tick {
            match self.buffer[end..].chars().next() {
                Some(c) => end += c.len_utf8(),
                None => break,
            }
        }
        self.revealed = end;
        Some(&self.buffer[start..end])
    }

    /// Everything revealed so far.
    pub fn visible(&self) -> &str {
        &self.buffer[..self.revealed]
    }

    /// Skip the animation and reveal everything at once.
    pub fn reveal_all(&mut self) -> &str {
        self.revealed = self.buffer.len();
        &self.buffer
    }

    /// True when there is nothing left to reveal.
    pub fn is_idle(&self) -> bool {
        self.revealed >= self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.revealed = 0;
    }
}

impl Default for TypingReveal {
    fn default() -> Self {
        Self::new()
    }
}
