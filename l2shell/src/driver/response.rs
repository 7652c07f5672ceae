//! Transcript type for command execution results.

use std::fmt;
use std::time::Duration;

/// The cleaned output of one command.
///
/// The echoed command line and the trailing prompt line are removed, escape
/// sequences are stripped and lines are joined with `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    command: String,
    output: String,
    raw: String,
    elapsed: Duration,
    interactions: usize,
}

impl Transcript {
    pub(crate) fn new(
        command: impl Into<String>,
        output: impl Into<String>,
        raw: impl Into<String>,
        elapsed: Duration,
        interactions: usize,
    ) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            raw: raw.into(),
            elapsed,
            interactions,
        }
    }

    /// The command that was executed.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The cleaned output.
    pub fn as_str(&self) -> &str {
        &self.output
    }

    /// Everything received, escape sequences stripped but otherwise untouched.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Time taken to execute the command.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// How many interaction steps were answered.
    pub fn interactions_answered(&self) -> usize {
        self.interactions
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }

    /// Check if the output contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.output.contains(pattern)
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    pub fn into_string(self) -> String {
        self.output
    }
}

impl AsRef<str> for Transcript {
    fn as_ref(&self) -> &str {
        &self.output
    }
}

impl From<Transcript> for String {
    fn from(transcript: Transcript) -> Self {
        transcript.output
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.output)
    }
}
