//! Managed device session: lazy connect, login, reconnect and retry.

use log::{debug, info, warn};

use super::CommandExecutor;
use super::automaton::{CommandAutomaton, Credentials};
use super::interactive::InteractionScript;
use super::response::Transcript;
use crate::error::{Error, Result, SessionError, TransportError};
use crate::transport::{Connector, DefaultConnector, SessionConfig, Transport};

/// A single device CLI session.
///
/// The connection is opened on first use and re-opened whenever the remote
/// end has gone away. After every (re)connect the banner is skipped and the
/// terminal setup command, if any, runs exactly once.
pub struct Session<C: Connector = DefaultConnector> {
    config: SessionConfig,
    connector: C,
    automaton: CommandAutomaton,
    transport: Option<C::Transport>,
}

impl Session<DefaultConnector> {
    /// Create a session that connects over the configured protocol.
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::with_connector(config, DefaultConnector)
    }
}

impl<C: Connector> Session<C> {
    /// Create a session with a custom connector.
    pub fn with_connector(config: SessionConfig, connector: C) -> Result<Self> {
        config.validate()?;
        let automaton = CommandAutomaton::from_config(&config)?;
        Ok(Self {
            config,
            connector,
            automaton,
            transport: None,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Whether a connection is currently held.
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Whether a connection is held and its remote end is alive.
    pub fn is_alive(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_alive())
    }

    /// Connect if there is no live connection.
    pub async fn ensure_connected(&mut self) -> Result<()> {
        let dead = self.transport.as_ref().is_some_and(|t| !t.is_alive());
        if dead {
            debug!("{}: remote end went away, reconnecting", self.config.target());
            self.close().await;
        }

        if self.transport.is_none() {
            let transport = self.establish().await?;
            self.transport = Some(transport);
        }
        Ok(())
    }

    /// Open a transport, get to the first prompt and set up the terminal.
    async fn establish(&self) -> Result<C::Transport> {
        let target = self.config.target();
        info!("{}: connecting over {:?}", target, self.config.protocol);

        let timeout = self.config.connect_timeout();
        let mut transport = tokio::time::timeout(timeout, self.connector.connect(&self.config))
            .await
            .map_err(|_| self.connect_timeout(timeout))??;

        match self.prepare(&mut transport).await {
            Ok(()) => {
                debug!("{}: session ready", target);
                Ok(transport)
            }
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    debug!("{}: error closing failed connection: {}", target, close_err);
                }
                Err(e)
            }
        }
    }

    async fn prepare(&self, transport: &mut C::Transport) -> Result<()> {
        let credentials = transport.needs_login().then_some(Credentials {
            username: &self.config.username,
            password: &self.config.password,
        });

        let banner = tokio::time::timeout(
            self.config.auth_timeout,
            self.automaton.skip_motd(transport, credentials),
        )
        .await
        .map_err(|_| self.connect_timeout(self.config.auth_timeout))??;
        debug!("{}: skipped {} bytes of banner", self.config.target(), banner.len());

        if let Some(command) = &self.config.config_term_cmd {
            self.automaton
                .run(transport, command, &InteractionScript::new())
                .await?;
        }
        Ok(())
    }

    fn connect_timeout(&self, timeout: std::time::Duration) -> Error {
        TransportError::ConnectTimeout {
            host: self.config.host.clone(),
            port: self.config.port(),
            timeout,
        }
        .into()
    }

    /// Run a command, answering the interaction script, and return its
    /// transcript.
    ///
    /// A transient failure (broken pipe, dead remote end, connect timeout)
    /// closes the session and replays the whole command on a fresh
    /// connection, up to the configured number of retries.
    pub async fn execute(
        &mut self,
        command: &str,
        interactions: &InteractionScript,
    ) -> Result<Transcript> {
        let mut attempt = 0;
        loop {
            match self.execute_once(command, interactions).await {
                Err(e) if e.is_transient() && attempt < self.config.retries => {
                    attempt += 1;
                    warn!(
                        "{}: '{}' failed ({}), reconnecting for retry {}/{}",
                        self.config.target(),
                        command,
                        e,
                        attempt,
                        self.config.retries
                    );
                    self.close().await;
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                result => return result,
            }
        }
    }

    /// Run a command with no interactions.
    pub async fn send_command(&mut self, command: &str) -> Result<Transcript> {
        self.execute(command, &InteractionScript::new()).await
    }

    async fn execute_once(
        &mut self,
        command: &str,
        interactions: &InteractionScript,
    ) -> Result<Transcript> {
        self.ensure_connected().await?;
        let transport = self.transport.as_mut().ok_or(SessionError::NotConnected)?;

        let result = self.automaton.run(transport, command, interactions).await;
        if let Err(e) = &result
            && self.closes_session(e)
        {
            self.close().await;
        }
        result
    }

    fn closes_session(&self, error: &Error) -> bool {
        match error {
            Error::Session(SessionError::CommandFailed { .. }) => {
                self.config.close_on_command_error
            }
            Error::Session(SessionError::TransactionTimeout { .. }) => {
                self.config.close_on_timeout
            }
            // The stream state is unknown after any transport failure
            Error::Transport(_) => true,
            _ => false,
        }
    }

    /// Close the connection. Safe to call at any time; never fails.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            debug!("{}: closing session", self.config.target());
            if let Err(e) = transport.close().await {
                warn!("{}: error while closing: {}", self.config.target(), e);
            }
        }
    }
}

impl<C: Connector> CommandExecutor for Session<C> {
    async fn execute(
        &mut self,
        command: &str,
        interactions: &InteractionScript,
    ) -> Result<Transcript> {
        Session::execute(self, command, interactions).await
    }

    async fn close(&mut self) {
        Session::close(self).await
    }
}
