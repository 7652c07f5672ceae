//! Per-command transcript buffer with a consumption cursor.
//!
//! Prompt detection only looks at the last `search_depth` bytes received
//! since the cursor, as the prompt regex is anchored at the end. Interaction
//! patterns are searched in the output received after the previous
//! interaction matched, so a dialog step is never satisfied by text that
//! arrived before the step before it.

use std::borrow::Cow;

use regex::bytes::Regex;

use super::ansi::AnsiStripper;
use super::patterns::PromptMatcher;

/// Buffer accumulating the output of one command.
#[derive(Debug)]
pub struct TranscriptBuffer {
    /// The accumulated output, escape sequences removed.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for the prompt.
    search_depth: usize,

    /// Offset where the search for the next interaction pattern starts.
    cursor: usize,

    stripper: AnsiStripper,
}

impl TranscriptBuffer {
    /// Create a new buffer with the specified prompt search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
            cursor: 0,
            stripper: AnsiStripper::new(),
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape codes.
    pub fn extend(&mut self, data: &[u8]) {
        self.stripper.strip_into(data, &mut self.buffer);
    }

    /// Search the output after the cursor and, on a match, move the cursor
    /// past it.
    pub fn advance_past(&mut self, pattern: &Regex) -> bool {
        match pattern.find(&self.buffer[self.cursor..]) {
            Some(m) => {
                self.cursor += m.end();
                true
            }
            None => false,
        }
    }

    /// Move the cursor to the end of the buffer. Output already seen will not
    /// satisfy [`pending_matches`](Self::pending_matches) again.
    pub fn mark(&mut self) {
        self.cursor = self.buffer.len();
    }

    /// Check the output received since the cursor (at most `search_depth`
    /// bytes of it) against a prompt matcher.
    pub fn pending_matches(&self, matcher: &dyn PromptMatcher) -> bool {
        matcher.is_match(self.pending())
    }

    /// Output received since the cursor, limited to the search depth.
    pub fn pending(&self) -> &[u8] {
        let start = self
            .cursor
            .max(self.buffer.len().saturating_sub(self.search_depth));
        &self.buffer[start..]
    }

    /// Build the transcript: echoed command line and trailing prompt line
    /// removed, `\r\n` normalized to `\n`.
    pub fn transcript(&self) -> String {
        strip_echo_and_prompt(&self.buffer)
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }
}

/// Drop the first line (command echo) and the last line (prompt) of raw
/// output and join the rest with `\n`.
pub fn strip_echo_and_prompt(raw: &[u8]) -> String {
    let mut lines = Vec::new();
    let mut start = 0;
    for end in memchr::memchr_iter(b'\n', raw) {
        lines.push(&raw[start..end]);
        start = end + 1;
    }
    if start < raw.len() {
        lines.push(&raw[start..]);
    }

    if lines.len() <= 2 {
        return String::new();
    }

    lines[1..lines.len() - 1]
        .iter()
        .map(|line| String::from_utf8_lossy(trim_cr(line)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn trim_cr(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && line[end - 1] == b'\r' {
        end -= 1;
    }
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PromptMark;

    #[test]
    fn test_basic_extend() {
        let mut buffer = TranscriptBuffer::new(100);
        buffer.extend(b"Hello, world!");
        assert_eq!(buffer.as_str_lossy(), "Hello, world!");
    }

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = TranscriptBuffer::new(100);
        buffer.extend(b"\x1b[32mGreen text\x1b[0m");
        assert_eq!(buffer.as_str_lossy(), "Green text");
    }

    #[test]
    fn test_advance_past_is_ordered() {
        let mut buffer = TranscriptBuffer::new(1000);
        let config = Regex::new(r"\(config\)#").unwrap();
        let vlan = Regex::new(r"\(config-vlan-10\)#").unwrap();

        buffer.extend(b"configure terminal\r\nsw0(config)#");
        assert!(buffer.advance_past(&config));
        // The same prompt must not satisfy the next step twice.
        assert!(!buffer.advance_past(&config));
        assert!(!buffer.advance_past(&vlan));

        buffer.extend(b"vlan 10\r\nsw0(config-vlan-10)#");
        assert!(buffer.advance_past(&vlan));
    }

    #[test]
    fn test_pending_ignores_consumed_output() {
        let mut buffer = TranscriptBuffer::new(1000);
        let prompt = PromptMark::new("#").unwrap();
        let base = Regex::new(r"\nsw0#").unwrap();

        buffer.extend(b"\nsw0#");
        assert!(buffer.pending_matches(&prompt));
        assert!(buffer.advance_past(&base));
        assert!(!buffer.pending_matches(&prompt));

        buffer.extend(b"end\r\nsw0#");
        assert!(buffer.pending_matches(&prompt));

        buffer.mark();
        assert!(buffer.pending().is_empty());
    }

    #[test]
    fn test_pending_bounded_by_search_depth() {
        let mut buffer = TranscriptBuffer::new(10);
        buffer.extend(b"\nsw0#");
        buffer.extend(&[b'x'; 100]);
        assert_eq!(buffer.pending().len(), 10);
        assert!(!buffer.pending_matches(&PromptMark::new("#").unwrap()));

        buffer.extend(b"\nsw0# ");
        assert!(buffer.pending_matches(&PromptMark::new("#").unwrap()));
    }

    #[test]
    fn test_strip_echo_and_prompt() {
        let raw = b"show vlan brief\r\nVLAN 1  default\r\nVLAN 10 servers\r\nsw0# ";
        assert_eq!(
            strip_echo_and_prompt(raw),
            "VLAN 1  default\nVLAN 10 servers"
        );
    }

    #[test]
    fn test_strip_no_trailing_newline_duplication() {
        let raw = b"show clock\r\n12:00:00\r\n\r\nsw0#\r\n";
        assert_eq!(strip_echo_and_prompt(raw), "12:00:00\n");
    }

    #[test]
    fn test_strip_empty_output() {
        assert_eq!(strip_echo_and_prompt(b"terminal length 0\r\nsw0#"), "");
        assert_eq!(strip_echo_and_prompt(b""), "");
    }

    #[test]
    fn test_strip_bare_lf() {
        let raw = b"show hostname\nsw0\nsw0# ";
        assert_eq!(strip_echo_and_prompt(raw), "sw0");
    }
}
