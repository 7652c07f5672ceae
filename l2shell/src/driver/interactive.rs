//! Interaction scripts for commands that converse with the operator.
//!
//! Many switch commands do not return straight to the prompt:
//! - `copy running-config startup-config` asks for confirmation
//! - `configure terminal` drops into a sub-mode whose prompt differs
//! - `reload` asks "Proceed with reload? [confirm]"
//!
//! An [`InteractionScript`] is an ordered list of (pattern, reply) pairs.
//! Step *k* can only match output that arrived after step *k-1* matched,
//! and each step fires at most once.

use std::fmt;

use regex::bytes::Regex;

/// One dialog step: when `pattern` shows up, send `reply`.
///
/// # Example
///
/// ```rust
/// use l2shell::Interaction;
///
/// let confirm = Interaction::new(r"Proceed.*\[confirm\]", "y").unwrap();
/// assert_eq!(confirm.reply(), "y");
/// ```
#[derive(Debug, Clone)]
pub struct Interaction {
    pattern: Regex,
    reply: String,
    hidden: bool,
}

impl Interaction {
    /// Create a new interaction, failing if the pattern is not a valid regex.
    pub fn new(pattern: &str, reply: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            reply: reply.into(),
            hidden: false,
        })
    }

    /// Create an interaction whose reply (a password, usually) is masked in logs.
    pub fn hidden(pattern: &str, reply: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            hidden: true,
            ..Self::new(pattern, reply)?
        })
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn reply(&self) -> &str {
        &self.reply
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// The reply as it may appear in logs.
    pub(crate) fn loggable_reply(&self) -> &str {
        if self.hidden { "********" } else { &self.reply }
    }
}

/// An ordered sequence of [`Interaction`]s.
#[derive(Debug, Clone, Default)]
pub struct InteractionScript {
    steps: Vec<Interaction>,
}

impl InteractionScript {
    /// An empty script: the command simply runs to the prompt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a script from (pattern, reply) pairs.
    pub fn from_pairs<I, P, R>(pairs: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (P, R)>,
        P: AsRef<str>,
        R: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(pattern, reply)| Interaction::new(pattern.as_ref(), reply))
            .collect()
    }

    pub fn push(&mut self, interaction: Interaction) {
        self.steps.push(interaction);
    }

    pub fn get(&self, index: usize) -> Option<&Interaction> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interaction> {
        self.steps.iter()
    }
}

impl FromIterator<Interaction> for InteractionScript {
    fn from_iter<T: IntoIterator<Item = Interaction>>(iter: T) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for InteractionScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("''");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "'{}' -> '{}'", step.pattern, step.loggable_reply())?;
        }
        Ok(())
    }
}

/// Builder for interaction scripts.
///
/// # Example
///
/// ```rust
/// use l2shell::InteractionBuilder;
///
/// let script = InteractionBuilder::new()
///     .expect(r"\(config\)#").unwrap()
///     .send("vlan 10")
///     .expect(r"\(config-vlan-10\)#").unwrap()
///     .send("end")
///     .build();
/// assert_eq!(script.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct InteractionBuilder {
    script: InteractionScript,
}

impl InteractionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern to wait for.
    ///
    /// Must be followed by `send()` or `send_hidden()` to give the reply.
    pub fn expect(self, pattern: &str) -> Result<InteractionBuilderWithPattern, regex::Error> {
        Ok(InteractionBuilderWithPattern {
            builder: self,
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn build(self) -> InteractionScript {
        self.script
    }
}

/// Intermediate state for the builder after `expect()` is called.
#[derive(Debug)]
pub struct InteractionBuilderWithPattern {
    builder: InteractionBuilder,
    pattern: Regex,
}

impl InteractionBuilderWithPattern {
    /// Reply to send once the pattern matched.
    pub fn send(self, reply: impl Into<String>) -> InteractionBuilder {
        self.finish(reply.into(), false)
    }

    /// Reply that is masked in logs.
    pub fn send_hidden(self, reply: impl Into<String>) -> InteractionBuilder {
        self.finish(reply.into(), true)
    }

    fn finish(mut self, reply: String, hidden: bool) -> InteractionBuilder {
        self.builder.script.push(Interaction {
            pattern: self.pattern,
            reply,
            hidden,
        });
        self.builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_new() {
        let step = Interaction::new(r"confirm", "y").unwrap();
        assert_eq!(step.reply(), "y");
        assert!(!step.is_hidden());
        assert!(step.pattern().is_match(b"[confirm]"));
    }

    #[test]
    fn test_interaction_invalid_pattern() {
        assert!(Interaction::new(r"(unclosed", "y").is_err());
    }

    #[test]
    fn test_hidden_reply_masked() {
        let step = Interaction::hidden(r"[Pp]assword:", "s3cret").unwrap();
        assert!(step.is_hidden());
        assert_eq!(step.reply(), "s3cret");
        assert_eq!(step.loggable_reply(), "********");
    }

    #[test]
    fn test_from_pairs() {
        let script = InteractionScript::from_pairs([
            (r"\(config\)#", "vlan 10"),
            (r"\(config-vlan-10\)#", "end"),
        ])
        .unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script.get(1).unwrap().reply(), "end");
    }

    #[test]
    fn test_builder_with_hidden() {
        let script = InteractionBuilder::new()
            .expect(r"Username:")
            .unwrap()
            .send("admin")
            .expect(r"Password:")
            .unwrap()
            .send_hidden("secret")
            .build();

        assert_eq!(script.len(), 2);
        assert!(!script.get(0).unwrap().is_hidden());
        assert!(script.get(1).unwrap().is_hidden());
    }

    #[test]
    fn test_display() {
        assert_eq!(InteractionScript::new().to_string(), "''");

        let script = InteractionBuilder::new()
            .expect("a")
            .unwrap()
            .send("b")
            .expect("pw")
            .unwrap()
            .send_hidden("x")
            .build();
        assert_eq!(script.to_string(), "'a' -> 'b'; 'pw' -> '********'");
    }
}
