//! Builder for creating device sessions.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::session::Session;
use super::shared::SharedSession;
use crate::error::{ConfigError, Result};
use crate::platform::{Dialect, DialectRegistry};
use crate::transport::{
    Connector, DefaultConnector, HostKeyVerification, LineEnding, PrivateKeyAuth, Protocol,
    SessionConfig,
};

/// Builder for constructing device sessions.
///
/// # Example
///
/// ```rust,no_run
/// use l2shell::SessionBuilder;
///
/// # async fn example() -> Result<(), l2shell::Error> {
/// let mut session = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .dialect("brocade_vdx")
///     .build()?;
/// let version = session.send_command("show version").await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    protocol: Protocol,
    port: Option<u16>,
    username: Option<String>,
    password: Option<SecretString>,
    private_key: Option<PrivateKeyAuth>,
    dialect_name: Option<String>,
    custom_dialect: Option<Dialect>,
    prompt_mark: Option<String>,
    error_mark: Option<String>,
    config_term_cmd: Option<String>,
    line_ending: Option<LineEnding>,
    socket_timeout: Option<Duration>,
    auth_timeout: Option<Duration>,
    transaction_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    close_on_command_error: Option<bool>,
    close_on_timeout: Option<bool>,
    retries: Option<u32>,
    retry_delay: Option<Duration>,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    legacy_algorithms: bool,
    terminal_size: Option<(u32, u32)>,
}

impl SessionBuilder {
    /// Create a new session builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            protocol: Protocol::Ssh,
            port: None,
            username: None,
            password: None,
            private_key: None,
            dialect_name: None,
            custom_dialect: None,
            prompt_mark: None,
            error_mark: None,
            config_term_cmd: None,
            line_ending: None,
            socket_timeout: None,
            auth_timeout: None,
            transaction_timeout: None,
            poll_interval: None,
            close_on_command_error: None,
            close_on_timeout: None,
            retries: None,
            retry_delay: None,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            legacy_algorithms: false,
            terminal_size: None,
        }
    }

    /// Connect over SSH (the default) or Telnet.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the port (default: 22 for SSH, 23 for Telnet).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication, tried before the password.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.private_key = Some(PrivateKeyAuth {
            path: key_path.into(),
            passphrase: None,
        });
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.private_key = Some(PrivateKeyAuth {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        });
        self
    }

    /// Use a registered dialect (e.g. "brocade_vdx") for marks and setup.
    pub fn dialect(mut self, name: impl Into<String>) -> Self {
        self.dialect_name = Some(name.into());
        self
    }

    /// Use a dialect that is not in the registry.
    pub fn custom_dialect(mut self, dialect: Dialect) -> Self {
        self.custom_dialect = Some(dialect);
        self
    }

    /// Override the dialect's prompt mark.
    pub fn prompt_mark(mut self, mark: impl Into<String>) -> Self {
        self.prompt_mark = Some(mark.into());
        self
    }

    /// Override the dialect's error mark.
    pub fn error_mark(mut self, mark: impl Into<String>) -> Self {
        self.error_mark = Some(mark.into());
        self
    }

    /// Override the dialect's terminal setup command.
    pub fn config_term_cmd(mut self, command: impl Into<String>) -> Self {
        self.config_term_cmd = Some(command.into());
        self
    }

    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = Some(line_ending);
        self
    }

    /// Set the connect and handshake timeout.
    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = Some(timeout);
        self
    }

    /// Set the login and first-prompt timeout.
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = Some(timeout);
        self
    }

    /// Set the per-command idle timeout.
    pub fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = Some(timeout);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn close_on_command_error(mut self, close: bool) -> Self {
        self.close_on_command_error = Some(close);
        self
    }

    pub fn close_on_timeout(mut self, close: bool) -> Self {
        self.close_on_timeout = Some(close);
        self
    }

    /// Set the transient-failure retry budget and the pause between attempts.
    pub fn retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = Some(retries);
        self.retry_delay = Some(delay);
        self
    }

    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Offer legacy SSH algorithms for old firmware.
    pub fn legacy_algorithms(mut self, enabled: bool) -> Self {
        self.legacy_algorithms = enabled;
        self
    }

    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_size = Some((width, height));
        self
    }

    /// Resolve the dialect and produce a validated configuration.
    pub fn build_config(self) -> Result<SessionConfig> {
        let username = self.username.ok_or(ConfigError::InvalidParameter {
            name: "username",
            message: "username is required".to_string(),
        })?;

        let dialect = if let Some(custom) = self.custom_dialect {
            Some(custom)
        } else if let Some(name) = self.dialect_name {
            let registry = DialectRegistry::global()
                .read()
                .map_err(|_| ConfigError::InvalidParameter {
                    name: "dialect",
                    message: "dialect registry lock poisoned".to_string(),
                })?;
            Some(
                registry
                    .get(&name)
                    .cloned()
                    .ok_or(ConfigError::UnknownDialect { name })?,
            )
        } else {
            None
        };

        let prompt_mark = self
            .prompt_mark
            .or_else(|| dialect.as_ref().map(|d| d.prompt_mark.clone()))
            .ok_or(ConfigError::InvalidParameter {
                name: "prompt_mark",
                message: "a prompt mark or a dialect is required".to_string(),
            })?;

        let mut config = SessionConfig::new(self.host, username, String::new(), prompt_mark);
        if let Some(password) = self.password {
            config.password = password;
        }
        config.protocol = self.protocol;
        config.port = self.port;
        config.private_key = self.private_key;
        config.error_mark = self
            .error_mark
            .or_else(|| dialect.as_ref().and_then(|d| d.error_mark.clone()));
        config.config_term_cmd = self
            .config_term_cmd
            .or_else(|| dialect.as_ref().and_then(|d| d.config_term_cmd.clone()));
        config.line_ending = self
            .line_ending
            .or(dialect.as_ref().map(|d| d.line_ending))
            .unwrap_or_default();
        config.socket_timeout = self.socket_timeout;
        if let Some(timeout) = self.auth_timeout {
            config.auth_timeout = timeout;
        }
        if let Some(timeout) = self.transaction_timeout {
            config.transaction_timeout = timeout;
        }
        if let Some(interval) = self.poll_interval {
            config.poll_interval = interval;
        }
        if let Some(close) = self.close_on_command_error {
            config.close_on_command_error = close;
        }
        if let Some(close) = self.close_on_timeout {
            config.close_on_timeout = close;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(delay) = self.retry_delay {
            config.retry_delay = delay;
        }
        config.host_key_verification = self.host_key_verification;
        config.known_hosts_path = self.known_hosts_path;
        config.legacy_algorithms = self.legacy_algorithms;
        if let Some((width, height)) = self.terminal_size {
            config.terminal_width = width;
            config.terminal_height = height;
        }

        config.validate()?;
        Ok(config)
    }

    /// Build the session.
    ///
    /// This does not connect; the first command does.
    pub fn build(self) -> Result<Session> {
        Session::new(self.build_config()?)
    }

    /// Build a session that opens transports through `connector`.
    pub fn build_with<C: Connector>(self, connector: C) -> Result<Session<C>> {
        Session::with_connector(self.build_config()?, connector)
    }

    /// Build a session shareable between tasks.
    pub fn build_shared(self) -> Result<SharedSession<DefaultConnector>> {
        self.build().map(SharedSession::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_dialect_supplies_marks() {
        let config = SessionBuilder::new("sw1")
            .username("admin")
            .password("secret")
            .dialect("dell_force10")
            .build_config()
            .unwrap();

        assert_eq!(config.prompt_mark, "#");
        assert_eq!(config.error_mark.as_deref(), Some("% Error: "));
        assert_eq!(config.config_term_cmd.as_deref(), Some("terminal length 0"));
    }

    #[test]
    fn test_explicit_values_override_dialect() {
        let config = SessionBuilder::new("sw1")
            .username("admin")
            .dialect("brocade_vdx")
            .prompt_mark(">")
            .line_ending(LineEnding::CrLf)
            .protocol(Protocol::Telnet)
            .transaction_timeout(Duration::from_secs(5))
            .retries(3, Duration::from_secs(1))
            .build_config()
            .unwrap();

        assert_eq!(config.prompt_mark, ">");
        assert_eq!(config.line_ending, LineEnding::CrLf);
        assert_eq!(config.port(), 23);
        assert_eq!(config.transaction_timeout, Duration::from_secs(5));
        assert_eq!(config.retries, 3);
    }

    #[test]
    fn test_unknown_dialect() {
        let result = SessionBuilder::new("sw1")
            .username("admin")
            .dialect("no_such_switch")
            .build_config();
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::UnknownDialect { .. }))
        ));
    }

    #[test]
    fn test_missing_username_or_prompt() {
        assert!(SessionBuilder::new("sw1").prompt_mark("#").build_config().is_err());
        assert!(SessionBuilder::new("sw1").username("admin").build_config().is_err());
    }

    #[test]
    fn test_build_does_not_connect() {
        let session = SessionBuilder::new("192.0.2.1")
            .username("admin")
            .password("secret")
            .prompt_mark("#")
            .build()
            .unwrap();
        assert!(!session.is_open());
    }
}
