//! Terminal escape sequence removal.
//!
//! Switch CLIs running behind a PTY emit colour codes, cursor movement and
//! the odd bell. The parser is stateful so a sequence split across two reads
//! is still removed.

use vte::{Parser, Perform};

/// Streaming ANSI/VT escape stripper.
pub struct AnsiStripper {
    parser: Parser,
}

impl AnsiStripper {
    /// Create a stripper with a fresh parser state.
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Strip escape sequences from `data`, appending printable text to `out`.
    pub fn strip_into(&mut self, data: &[u8], out: &mut Vec<u8>) {
        let mut sink = PrintableSink { out };
        self.parser.advance(&mut sink, data);
    }
}

impl Default for AnsiStripper {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AnsiStripper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnsiStripper").finish_non_exhaustive()
    }
}

/// Keeps printable characters and line control, drops everything else.
struct PrintableSink<'a> {
    out: &'a mut Vec<u8>,
}

impl Perform for PrintableSink<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out
            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.push(byte);
        }
    }
}
