//! Error types for l2shell.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for l2shell operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection, authentication and I/O errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Command execution errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Invalid construction parameters
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Vendor driver errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

impl Error {
    /// Whether this failure is worth one reconnect-and-retry of the whole command.
    ///
    /// Broken pipes, resets, aborted connections, a remote end that went away
    /// and connect timeouts qualify. Authentication failures, transaction
    /// timeouts and device-reported command errors never do.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_transient(),
            _ => false,
        }
    }

    /// The device-reported error message, if this is a command failure.
    pub fn command_failure(&self) -> Option<&str> {
        match self {
            Error::Session(SessionError::CommandFailed { message }) => Some(message),
            _ => None,
        }
    }

    /// Whether this is a transaction timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Session(SessionError::TransactionTimeout { .. }))
    }

    /// Whether this is an authentication failure.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::AuthenticationFailed { .. })
        )
    }
}

/// Transport layer errors (connection, authentication, remote end liveness).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Connecting or authenticating took longer than allowed
    #[error("Timed out connecting to {host}:{port} after {timeout:?}")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}': {reason}")]
    AuthenticationFailed { user: String, reason: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key not present in known_hosts (strict verification)
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// The remote shell exited or the socket was closed under us
    #[error("Remote end terminated: {reason}")]
    ProcessDied { reason: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// See [`Error::is_transient`].
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::ConnectTimeout { .. } | TransportError::ProcessDied { .. } => true,
            TransportError::ConnectionFailed { source, .. } => is_transient_io(source),
            TransportError::Io(e) => is_transient_io(e),
            TransportError::Ssh(e) => match e {
                russh::Error::IO(io) => is_transient_io(io),
                russh::Error::Disconnect | russh::Error::SendError => true,
                _ => false,
            },
            _ => false,
        }
    }
}

fn is_transient_io(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
    )
}

/// Session layer errors (command execution).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Neither new data nor a prompt/interaction match within the budget
    #[error(
        "Incomplete data received: stuck process or bad configured interactions \
         (transaction_timeout={timeout:?})"
    )]
    TransactionTimeout {
        timeout: Duration,
        /// Output accumulated before the timeout fired
        partial: String,
    },

    /// The device reported an error banner for the last command
    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    /// Session has no live connection
    #[error("Session not connected")]
    NotConnected,
}

/// Construction parameter errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required parameter is missing or has an unusable value
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// A prompt, error or interaction pattern failed to compile
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A configuration document or operation table could not be parsed
    #[error("Unable to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Dialect lookup or registration failure
    #[error("Unknown dialect '{name}'")]
    UnknownDialect { name: String },

    /// Dialect already registered
    #[error("Dialect '{name}' is already registered")]
    DialectExists { name: String },
}

/// Vendor driver errors.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The driver does not implement this operation
    #[error("Operation '{operation}' is not supported by this driver")]
    Unsupported { operation: &'static str },

    /// A transcript could not be turned into structured data
    #[error("Unable to parse output of '{command}': {message}")]
    Parse { command: String, message: String },

    /// The requested object does not exist on the device
    #[error("{kind} '{id}' does not exist")]
    NotFound { kind: &'static str, id: String },
}

/// Result type alias using l2shell's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let broken: Error = TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).into();
        assert!(broken.is_transient());

        let reset: Error =
            TransportError::Io(io::Error::from(io::ErrorKind::ConnectionReset)).into();
        assert!(reset.is_transient());

        let died: Error = TransportError::ProcessDied {
            reason: "eof".into(),
        }
        .into();
        assert!(died.is_transient());

        let refused: Error = TransportError::ConnectionFailed {
            host: "sw1".into(),
            port: 22,
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        }
        .into();
        assert!(!refused.is_transient());
    }

    #[test]
    fn test_non_transient() {
        let auth: Error = TransportError::AuthenticationFailed {
            user: "admin".into(),
            reason: "bad password".into(),
        }
        .into();
        assert!(!auth.is_transient());
        assert!(auth.is_auth_failure());

        let timeout: Error = SessionError::TransactionTimeout {
            timeout: Duration::from_secs(1),
            partial: String::new(),
        }
        .into();
        assert!(!timeout.is_transient());
        assert!(timeout.is_timeout());

        let failed: Error = SessionError::CommandFailed {
            message: "% Error: bad vlan".into(),
        }
        .into();
        assert!(!failed.is_transient());
        assert_eq!(failed.command_failure(), Some("% Error: bad vlan"));
    }
}
