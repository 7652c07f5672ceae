//! Session configuration.
//!
//! [`SessionConfig`] carries everything needed to reach one device and drive
//! its CLI. It can be built in code through
//! [`SessionBuilder`](crate::SessionBuilder) or deserialized from an
//! inventory file; durations are given in (fractional) seconds.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Default budget for TCP connect and protocol handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// How a device is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Ssh,
    Telnet,
}

impl Protocol {
    /// Well-known port for the protocol.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ssh => 22,
            Protocol::Telnet => 23,
        }
    }
}

/// Terminator appended to every line sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum LineEnding {
    #[default]
    #[serde(rename = "crlf")]
    CrLf,
    #[serde(rename = "lf")]
    Lf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::CrLf => "\r\n",
            LineEnding::Lf => "\n",
        }
    }

    /// Append the terminator unless the line already ends with it.
    pub fn terminate(self, line: &str) -> String {
        let ending = self.as_str();
        if line.ends_with(ending) {
            line.to_string()
        } else {
            format!("{line}{ending}")
        }
    }
}

/// Private key used for SSH public key authentication.
#[derive(Debug, Clone, Deserialize)]
pub struct PrivateKeyAuth {
    /// Path to the private key file.
    pub path: PathBuf,

    /// Passphrase for encrypted keys.
    #[serde(default, deserialize_with = "de::optional_secret")]
    pub passphrase: Option<SecretString>,
}

/// Connection and dialog parameters for one device session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// Transport protocol.
    #[serde(default)]
    pub protocol: Protocol,

    /// TCP port; the protocol's well-known port when unset.
    #[serde(default)]
    pub port: Option<u16>,

    /// Username for authentication.
    pub username: String,

    /// Password, used for SSH password/keyboard-interactive auth and for
    /// in-band Telnet login.
    #[serde(deserialize_with = "de::secret")]
    pub password: SecretString,

    /// Optional SSH private key, tried before the password.
    #[serde(default)]
    pub private_key: Option<PrivateKeyAuth>,

    /// Prompt mark regex fragment (e.g. `#`).
    pub prompt_mark: String,

    /// Error mark regex fragment (e.g. `% Error: `).
    #[serde(default)]
    pub error_mark: Option<String>,

    /// Command run once right after every (re)connect, such as
    /// `terminal length 0`.
    #[serde(default)]
    pub config_term_cmd: Option<String>,

    #[serde(default)]
    pub line_ending: LineEnding,

    /// Budget for TCP connect and protocol handshake.
    #[serde(default, deserialize_with = "de::optional_seconds")]
    pub socket_timeout: Option<Duration>,

    /// Budget for authentication and reaching the first prompt.
    #[serde(default = "default_auth_timeout", deserialize_with = "de::seconds")]
    pub auth_timeout: Duration,

    /// Idle budget of a single command.
    #[serde(
        default = "default_transaction_timeout",
        deserialize_with = "de::seconds"
    )]
    pub transaction_timeout: Duration,

    /// How long a single read waits for data.
    #[serde(default = "default_poll_interval", deserialize_with = "de::seconds")]
    pub poll_interval: Duration,

    /// Bytes from the end of the output searched for the prompt.
    #[serde(default = "default_search_depth")]
    pub search_depth: usize,

    /// Close the session when the device reports a command error.
    #[serde(default)]
    pub close_on_command_error: bool,

    /// Close the session when a command times out.
    #[serde(default = "default_true")]
    pub close_on_timeout: bool,

    /// Reconnect-and-retry attempts after a transient failure.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Pause before a retry.
    #[serde(default = "default_retry_delay", deserialize_with = "de::seconds")]
    pub retry_delay: Duration,

    #[serde(default)]
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts; the user's default file when unset.
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,

    /// Offer legacy key exchange, cipher and MAC algorithms over SSH.
    #[serde(default)]
    pub legacy_algorithms: bool,

    #[serde(default = "default_terminal_width")]
    pub terminal_width: u32,

    #[serde(default = "default_terminal_height")]
    pub terminal_height: u32,
}

fn default_auth_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_transaction_timeout() -> Duration {
    Duration::from_secs(180)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(10)
}

fn default_search_depth() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_terminal_width() -> u32 {
    511
}

fn default_terminal_height() -> u32 {
    24
}

impl SessionConfig {
    /// A configuration with every optional parameter at its default.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        prompt_mark: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            protocol: Protocol::default(),
            port: None,
            username: username.into(),
            password: SecretString::from(password.into()),
            private_key: None,
            prompt_mark: prompt_mark.into(),
            error_mark: None,
            config_term_cmd: None,
            line_ending: LineEnding::default(),
            socket_timeout: None,
            auth_timeout: default_auth_timeout(),
            transaction_timeout: default_transaction_timeout(),
            poll_interval: default_poll_interval(),
            search_depth: default_search_depth(),
            close_on_command_error: false,
            close_on_timeout: true,
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            legacy_algorithms: false,
            terminal_width: default_terminal_width(),
            terminal_height: default_terminal_height(),
        }
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Effective TCP port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.protocol.default_port())
    }

    /// Effective connect budget.
    pub fn connect_timeout(&self) -> Duration {
        self.socket_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }

    /// `user@host:port`, used to tag log lines.
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port())
    }

    /// Check the parameters a session cannot work without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(invalid("host", "must not be empty"));
        }
        if self.username.is_empty() {
            return Err(invalid("username", "must not be empty"));
        }
        if self.prompt_mark.is_empty() {
            return Err(invalid("prompt_mark", "must not be empty"));
        }
        if self.port == Some(0) {
            return Err(invalid("port", "must be between 1 and 65535"));
        }
        if self.poll_interval.is_zero() {
            return Err(invalid("poll_interval", "must be positive"));
        }
        if self.transaction_timeout < self.poll_interval {
            return Err(invalid(
                "transaction_timeout",
                "must be at least one poll interval",
            ));
        }
        if self.auth_timeout.is_zero() {
            return Err(invalid("auth_timeout", "must be positive"));
        }
        if self.search_depth == 0 {
            return Err(invalid("search_depth", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, message: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        message: message.to_string(),
    }
}

/// Field deserializers shared by configuration types.
pub(crate) mod de {
    use super::*;

    pub fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }

    pub fn optional_seconds<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        match Option::<f64>::deserialize(deserializer)? {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }

    pub fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
        String::deserialize(deserializer).map(SecretString::from)
    }

    pub fn optional_secret<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SecretString>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("sw1", "admin", "secret", "#");
        assert_eq!(config.port(), 22);
        assert_eq!(config.transaction_timeout, Duration::from_secs(180));
        assert_eq!(config.retries, 1);
        assert!(config.close_on_timeout);
        assert!(!config.close_on_command_error);
        assert_eq!(config.target(), "admin@sw1:22");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_telnet_default_port() {
        let mut config = SessionConfig::new("sw1", "admin", "secret", "#");
        config.protocol = Protocol::Telnet;
        assert_eq!(config.port(), 23);
        config.port = Some(2323);
        assert_eq!(config.port(), 2323);
    }

    #[test]
    fn test_from_json() {
        let config = SessionConfig::from_json(
            r#"{
                "host": "10.0.0.1",
                "protocol": "telnet",
                "username": "admin",
                "password": "hunter2",
                "prompt_mark": "#",
                "error_mark": "% Error: ",
                "line_ending": "lf",
                "transaction_timeout": 2.5,
                "close_on_timeout": false
            }"#,
        )
        .unwrap();

        assert_eq!(config.protocol, Protocol::Telnet);
        assert_eq!(config.port(), 23);
        assert_eq!(config.password.expose_secret(), "hunter2");
        assert_eq!(config.line_ending, LineEnding::Lf);
        assert_eq!(config.transaction_timeout, Duration::from_millis(2500));
        assert!(!config.close_on_timeout);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let config = SessionConfig::new("sw1", "admin", "hunter2", "#");
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_validation() {
        let config = SessionConfig::new("", "admin", "x", "#");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name: "host", .. })
        ));

        let config = SessionConfig::new("sw1", "admin", "x", "");
        assert!(config.validate().is_err());

        let mut config = SessionConfig::new("sw1", "admin", "x", "#");
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::new("sw1", "admin", "x", "#");
        config.transaction_timeout = Duration::from_millis(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_line_ending() {
        assert_eq!(LineEnding::CrLf.terminate("show vlan"), "show vlan\r\n");
        assert_eq!(LineEnding::CrLf.terminate("show vlan\r\n"), "show vlan\r\n");
        assert_eq!(LineEnding::Lf.terminate("show vlan"), "show vlan\n");
    }
}
