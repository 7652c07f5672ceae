//! Pattern matching utilities for prompt, error and login detection.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// Trait for prompt matching - regex by default, extensible for custom parsers.
pub trait PromptMatcher: Send + Sync {
    /// Returns byte offset where match ends, or None if no match.
    fn find_match(&self, data: &[u8]) -> Option<usize>;

    /// Check if the data matches the pattern.
    fn is_match(&self, data: &[u8]) -> bool {
        self.find_match(data).is_some()
    }
}

/// Regex-based prompt matcher (the default implementation).
impl PromptMatcher for Regex {
    fn find_match(&self, data: &[u8]) -> Option<usize> {
        self.find(data).map(|m| m.end())
    }
}

/// The compiled prompt mark of a device CLI.
///
/// A mark such as `#` or `->` is expanded so that it only matches a prompt
/// line at the very end of the output: an optional hostname made of
/// `[a-z0-9.-@_]` followed by the mark. Configuration sub-mode prompts like
/// `sw0(config)#` therefore never count as the base prompt.
#[derive(Debug, Clone)]
pub struct PromptMark {
    mark: String,
    pattern: Regex,
}

impl PromptMark {
    /// Compile a prompt mark (a regex fragment, e.g. `#` or `->`).
    pub fn new(mark: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            mark: mark.to_string(),
            pattern: expand_prompt_mark(mark)?,
        })
    }

    /// Use a complete, caller-supplied prompt regex verbatim.
    pub fn from_regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            mark: pattern.to_string(),
            pattern: Regex::new(pattern)?,
        })
    }

    /// The mark this prompt was built from.
    pub fn mark(&self) -> &str {
        &self.mark
    }

    /// Get a reference to the underlying regex.
    pub fn regex(&self) -> &Regex {
        &self.pattern
    }
}

impl PromptMatcher for PromptMark {
    fn find_match(&self, data: &[u8]) -> Option<usize> {
        self.pattern.find(data).map(|m| m.end())
    }
}

/// Build the end-anchored prompt regex for a prompt mark.
pub fn expand_prompt_mark(mark: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)(?:\r)?\n(?:[a-z0-9.\-@_]+)?\s*{mark}\s*$"))
}

/// The compiled error mark of a device CLI.
///
/// Matches the mark followed by at least one more character on the same
/// line. The reported message is the whole matched text, trimmed. A mark
/// at the end of a line, with its text on the next one, is not an error:
/// devices print the message on the mark's line, and a bare mark shows up
/// in echoed help text.
#[derive(Debug, Clone)]
pub struct ErrorMark {
    pattern: regex::Regex,
}

impl ErrorMark {
    /// Compile an error mark (a regex fragment, e.g. `% Error: `).
    pub fn new(mark: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: regex::Regex::new(&format!("(?:{mark}).+"))?,
        })
    }

    /// Find the first error banner in a stripped transcript.
    pub fn find_message(&self, transcript: &str) -> Option<String> {
        self.pattern
            .find(transcript)
            .map(|m| m.as_str().trim().to_string())
            .filter(|message| !message.is_empty())
    }
}

/// In-band login prompt (Telnet, or shells that ask again after SSH).
pub(crate) static LOGIN_PROMPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:login|user(?: ?name)?)\s*:\s*$").expect("valid login prompt pattern")
});

/// In-band password prompt.
pub(crate) static PASSWORD_PROMPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)pass(?:word|wd)?\s*:\s*$").expect("valid password prompt pattern")
});

/// Banners a device prints when it rejects credentials.
pub(crate) static AUTH_REJECTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:login incorrect|authentication failed|access denied|bad password|invalid (?:login|password|user))",
    )
    .expect("valid auth rejection pattern")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_prompt_matcher() {
        let pattern = Regex::new(r"router#\s*$").unwrap();
        assert!(pattern.is_match(b"router# "));
        assert!(pattern.is_match(b"some output\nrouter#"));
        assert!(!pattern.is_match(b"router> "));
    }

    #[test]
    fn test_prompt_mark_matches_base_prompt() {
        let prompt = PromptMark::new("#").unwrap();
        assert!(prompt.is_match(b"show vlan\r\nVLAN 10\r\nsw0# "));
        assert!(prompt.is_match(b"output\nsw-core.lab@site_1#"));
        assert!(prompt.is_match(b"output\r\n#"));
        assert!(prompt.is_match(b"output\r\nSW0#"));
    }

    #[test]
    fn test_prompt_mark_ignores_config_submodes() {
        let prompt = PromptMark::new("#").unwrap();
        assert!(!prompt.is_match(b"configure terminal\r\nsw0(config)#"));
        assert!(!prompt.is_match(b"\r\nsw0(config-vlan-10)# "));
    }

    #[test]
    fn test_prompt_mark_needs_line_start() {
        let prompt = PromptMark::new("#").unwrap();
        // A '#' inside a line is output, not a prompt.
        assert!(!prompt.is_match(b"show run\r\n! comment line #"));
        assert!(!prompt.is_match(b"sw0#"));
    }

    #[test]
    fn test_multichar_prompt_mark() {
        let prompt = PromptMark::new("->").unwrap();
        assert!(prompt.is_match(b"show vc\r\n->"));
        assert!(prompt.is_match(b"show vc\r\n-> "));
        assert_eq!(prompt.mark(), "->");
    }

    #[test]
    fn test_prompt_from_regex() {
        let prompt = PromptMark::from_regex(r"[$#]\s*$").unwrap();
        assert!(prompt.is_match(b"user@host:~$ "));
    }

    #[test]
    fn test_error_mark_message() {
        let error = ErrorMark::new("% Error: ").unwrap();
        let transcript = "interface vlan 5000\n% Error: Invalid VLAN id\nmore output";
        assert_eq!(
            error.find_message(transcript).as_deref(),
            Some("% Error: Invalid VLAN id")
        );
    }

    #[test]
    fn test_error_mark_requires_text() {
        let error = ErrorMark::new("% Error: ").unwrap();
        assert!(error.find_message("% Error: ").is_none());
        assert!(error.find_message("all good").is_none());
    }

    #[test]
    fn test_error_mark_at_line_end_ignored() {
        let error = ErrorMark::new("% Error: ").unwrap();
        assert!(
            error
                .find_message("% Error: \nNo such interface gi 0/99")
                .is_none()
        );
        assert_eq!(
            error
                .find_message("% Error: \n% Error: No such interface gi 0/99")
                .as_deref(),
            Some("% Error: No such interface gi 0/99")
        );
    }

    #[test]
    fn test_error_mark_alternation() {
        let error = ErrorMark::new("(?:Error:|Invalid input ->) ").unwrap();
        assert_eq!(
            error.find_message("vlan 99 foo\nInvalid input -> foo").as_deref(),
            Some("Invalid input -> foo")
        );
    }

    #[test]
    fn test_login_markers() {
        assert!(LOGIN_PROMPT.is_match(b"\r\nlogin: "));
        assert!(LOGIN_PROMPT.is_match(b"User Name:"));
        assert!(LOGIN_PROMPT.is_match(b"Username: "));
        assert!(!LOGIN_PROMPT.is_match(b"Last login: Mon Jan 1 from 10.0.0.1\r\n"));
        assert!(PASSWORD_PROMPT.is_match(b"Password: "));
        assert!(PASSWORD_PROMPT.is_match(b"passwd:"));
        assert!(AUTH_REJECTED.is_match(b"\r\nLogin incorrect\r\n"));
    }
}
