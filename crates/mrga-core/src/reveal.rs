//! Incremental text reveal for a streamed reply.
//!
//! Bytes arrive in arbitrary chunks; [`StreamBuffer`] keeps only whole UTF-8
//! characters visible to the rest of the code and holds a split sequence back
//! until its tail arrives.  [`RevealPacer`] walks a cursor over the received
//! text a few characters per tick.

use std::time::Duration;

/// Accumulates the raw byte stream of one reply.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    text: String,
    pending: Vec<u8>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk.  Invalid sequences become U+FFFD; an incomplete
    /// trailing sequence is kept for the next chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    self.text.push_str(s);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.text
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// End of stream: whatever is still pending can never complete.
    pub fn finish(&mut self) {
        if !self.pending.is_empty() {
            self.text.push(char::REPLACEMENT_CHARACTER);
            self.pending.clear();
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Reveal cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealPace {
    pub step_chars: usize,
    pub interval: Duration,
}

impl Default for RevealPace {
    fn default() -> Self {
        Self {
            step_chars: 4,
            interval: Duration::from_millis(15),
        }
    }
}

/// Byte cursor into the received text, always on a char boundary.
#[derive(Debug, Default, Clone, Copy)]
pub struct RevealPacer {
    revealed: usize,
    step_chars: usize,
}

impl RevealPacer {
    pub fn new(step_chars: usize) -> Self {
        Self {
            revealed: 0,
            step_chars: step_chars.max(1),
        }
    }

    /// Advance by up to `step_chars` characters.  Returns true if anything new
    /// became visible.
    pub fn step(&mut self, text: &str) -> bool {
        let rest = &text[self.revealed..];
        if rest.is_empty() {
            return false;
        }
        let advance = rest
            .char_indices()
            .nth(self.step_chars)
            .map_or(rest.len(), |(idx, _)| idx);
        self.revealed += advance;
        true
    }

    pub fn visible<'a>(&self, text: &'a str) -> &'a str {
        &text[..self.revealed]
    }

    pub fn caught_up(&self, text: &str) -> bool {
        self.revealed >= text.len()
    }
}
