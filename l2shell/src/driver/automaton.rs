//! The command automaton: send a line, drive the dialog, collect the output.
//!
//! Output is polled in short reads. Each read that returns nothing counts
//! against the transaction budget (`transaction_timeout / poll_interval`
//! consecutive empty reads); any data resets the count. After every read the
//! next unconsumed interaction is tried against the output that arrived after
//! the previous one matched, and once the script is exhausted the prompt mark
//! ends the command.

use std::time::Duration;

use log::{debug, info, trace, warn};
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use super::interactive::InteractionScript;
use super::response::Transcript;
use crate::channel::{
    AUTH_REJECTED, ErrorMark, LOGIN_PROMPT, PASSWORD_PROMPT, PromptMark, TranscriptBuffer,
};
use crate::error::{ConfigError, Result, SessionError, TransportError};
use crate::transport::{LineEnding, SessionConfig, Transport};

/// Consecutive empty reads after which a silent shell is nudged with a newline.
const STALE_POLLS: u32 = 10;

/// Credentials typed into the stream by transports that need in-band login.
#[derive(Clone, Copy)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a SecretString,
}

/// Per-session command state machine.
#[derive(Debug, Clone)]
pub struct CommandAutomaton {
    prompt: PromptMark,
    error: Option<ErrorMark>,
    line_ending: LineEnding,
    poll_interval: Duration,
    transaction_timeout: Duration,
    search_depth: usize,
}

impl CommandAutomaton {
    /// Create an automaton with default timing.
    pub fn new(prompt: PromptMark, error: Option<ErrorMark>) -> Self {
        Self {
            prompt,
            error,
            line_ending: LineEnding::default(),
            poll_interval: Duration::from_millis(10),
            transaction_timeout: Duration::from_secs(180),
            search_depth: 1000,
        }
    }

    /// Compile the marks and copy the timing of a session configuration.
    pub fn from_config(config: &SessionConfig) -> std::result::Result<Self, ConfigError> {
        let prompt = PromptMark::new(&config.prompt_mark)?;
        let error = config
            .error_mark
            .as_deref()
            .filter(|mark| !mark.is_empty())
            .map(ErrorMark::new)
            .transpose()?;

        Ok(Self::new(prompt, error)
            .with_line_ending(config.line_ending)
            .with_timing(config.poll_interval, config.transaction_timeout)
            .with_search_depth(config.search_depth))
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn with_timing(mut self, poll_interval: Duration, transaction_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.transaction_timeout = transaction_timeout;
        self
    }

    pub fn with_search_depth(mut self, search_depth: usize) -> Self {
        self.search_depth = search_depth;
        self
    }

    pub fn prompt(&self) -> &PromptMark {
        &self.prompt
    }

    /// Consecutive empty reads tolerated before a transaction times out.
    pub fn max_idle_polls(&self) -> u128 {
        let poll = self.poll_interval.as_nanos().max(1);
        (self.transaction_timeout.as_nanos() / poll).max(1)
    }

    /// Run one command through its interaction script and return the
    /// cleaned transcript.
    pub async fn run<T: Transport>(
        &self,
        transport: &mut T,
        command: &str,
        script: &InteractionScript,
    ) -> Result<Transcript> {
        info!("Command '{}' invoked with interactions: {}", command, script);

        let start = Instant::now();
        let max_idle = self.max_idle_polls();
        let mut buffer = TranscriptBuffer::new(self.search_depth);
        let mut answered = 0;
        let mut idle_polls: u128 = 0;

        self.send_line(transport, command).await?;

        loop {
            match transport.recv(self.poll_interval).await? {
                Some(chunk) if !chunk.is_empty() => {
                    trace!("received {} bytes", chunk.len());
                    buffer.extend(&chunk);
                    idle_polls = 0;
                }
                _ => {
                    idle_polls += 1;
                    if idle_polls >= max_idle {
                        warn!(
                            "Command '{}' produced no prompt within {:?}",
                            command, self.transaction_timeout
                        );
                        return Err(SessionError::TransactionTimeout {
                            timeout: self.transaction_timeout,
                            partial: buffer.as_str_lossy().into_owned(),
                        }
                        .into());
                    }
                    continue;
                }
            }

            while let Some(step) = script.get(answered) {
                if !buffer.advance_past(step.pattern()) {
                    break;
                }
                debug!(
                    "Interaction '{}' matched, replying '{}'",
                    step.pattern(),
                    step.loggable_reply()
                );
                self.send_line(transport, step.reply()).await?;
                answered += 1;
            }

            if answered == script.len() && buffer.pending_matches(&self.prompt) {
                break;
            }
        }

        let output = buffer.transcript();
        if let Some(error) = &self.error
            && let Some(message) = error.find_message(&output)
        {
            info!("Command '{}' failed: {}", command, message);
            return Err(SessionError::CommandFailed { message }.into());
        }

        Ok(Transcript::new(
            command,
            output,
            buffer.as_str_lossy(),
            start.elapsed(),
            answered,
        ))
    }

    /// Consume the banner of a freshly opened shell up to the first prompt.
    ///
    /// With `credentials`, in-band `login:`/`Password:` prompts are answered
    /// once each; a second request or a rejection banner means the
    /// credentials were refused. A shell that stays silent gets one bare
    /// newline. The caller bounds the whole exchange with its own timeout.
    pub(crate) async fn skip_motd<T: Transport>(
        &self,
        transport: &mut T,
        credentials: Option<Credentials<'_>>,
    ) -> Result<String> {
        let mut buffer = TranscriptBuffer::new(self.search_depth);
        // The first prompt may be the very first thing on the wire.
        buffer.extend(b"\n");

        let mut user_sent = false;
        let mut password_sent = false;
        let mut probe_sent = false;
        let mut stale_polls = 0;

        loop {
            match transport.recv(self.poll_interval).await? {
                Some(chunk) if !chunk.is_empty() => {
                    buffer.extend(&chunk);
                    stale_polls = 0;
                }
                _ => {
                    stale_polls += 1;
                    if stale_polls >= STALE_POLLS && !probe_sent {
                        debug!("Shell is silent, sending a newline");
                        transport.send(self.line_ending.as_str().as_bytes()).await?;
                        probe_sent = true;
                    }
                    continue;
                }
            }

            if let Some(credentials) = credentials {
                if password_sent && AUTH_REJECTED.is_match(buffer.pending()) {
                    return Err(auth_failed(credentials, "credentials rejected by device"));
                }

                if buffer.pending_matches(&*PASSWORD_PROMPT) {
                    if password_sent {
                        return Err(auth_failed(credentials, "password requested again"));
                    }
                    trace!("Password prompt found, sending password");
                    self.send_line(transport, credentials.password.expose_secret())
                        .await?;
                    password_sent = true;
                    buffer.mark();
                    continue;
                }

                if buffer.pending_matches(&*LOGIN_PROMPT) {
                    if user_sent {
                        return Err(auth_failed(credentials, "login requested again"));
                    }
                    trace!("Login prompt found, sending username");
                    self.send_line(transport, credentials.username).await?;
                    user_sent = true;
                    buffer.mark();
                    continue;
                }
            }

            if buffer.pending_matches(&self.prompt) {
                let banner = buffer.as_str_lossy().trim().to_string();
                trace!("Prompt found after banner: {}", banner);
                return Ok(banner);
            }
        }
    }

    async fn send_line<T: Transport>(&self, transport: &mut T, line: &str) -> Result<()> {
        transport
            .send(self.line_ending.terminate(line).as_bytes())
            .await
    }
}

fn auth_failed(credentials: Credentials<'_>, reason: &str) -> crate::error::Error {
    TransportError::AuthenticationFailed {
        user: credentials.username.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
