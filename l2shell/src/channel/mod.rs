//! Channel layer for pattern matching and transcript accumulation.
//!
//! This module handles everything that looks at the raw byte stream of an
//! interactive CLI: prompt, error and login detection, escape stripping and
//! trimming of the echoed command and trailing prompt.

mod ansi;
mod buffer;
mod patterns;

pub use ansi::AnsiStripper;
pub use buffer::{TranscriptBuffer, strip_echo_and_prompt};
pub use patterns::{ErrorMark, PromptMark, PromptMatcher, expand_prompt_mark};
pub(crate) use patterns::{AUTH_REJECTED, LOGIN_PROMPT, PASSWORD_PROMPT};
