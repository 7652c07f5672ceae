//! CLI dialect of a switch family.

use serde::Deserialize;

use crate::transport::LineEnding;

/// The shell conventions of one switch family: how its prompt ends, how it
/// reports errors and how its terminal is prepared.
///
/// Dialects are plain data and can be loaded from JSON as well as built in
/// code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Dialect {
    /// Registry name (e.g., "brocade_vdx").
    pub name: String,

    pub vendor: String,

    /// Hardware family the dialect was written for.
    pub hardware: String,

    /// Prompt mark regex fragment.
    pub prompt_mark: String,

    /// Error mark regex fragment.
    #[serde(default)]
    pub error_mark: Option<String>,

    /// Command run after every (re)connect.
    #[serde(default)]
    pub config_term_cmd: Option<String>,

    #[serde(default)]
    pub line_ending: LineEnding,
}

impl Dialect {
    pub fn new(
        name: impl Into<String>,
        vendor: impl Into<String>,
        hardware: impl Into<String>,
        prompt_mark: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vendor: vendor.into(),
            hardware: hardware.into(),
            prompt_mark: prompt_mark.into(),
            error_mark: None,
            config_term_cmd: None,
            line_ending: LineEnding::default(),
        }
    }

    pub fn with_error_mark(mut self, mark: impl Into<String>) -> Self {
        self.error_mark = Some(mark.into());
        self
    }

    pub fn with_config_term_cmd(mut self, command: impl Into<String>) -> Self {
        self.config_term_cmd = Some(command.into());
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }
}
