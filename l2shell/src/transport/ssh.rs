//! SSH transport implementation using russh.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace, warn};
use russh::client::{self, Handle, KeyboardInteractiveAuthResponse, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg, Preferred, cipher, kex, mac};
use secrecy::ExposeSecret;
use tokio::time::Instant;

use super::Transport;
use super::config::{HostKeyVerification, SessionConfig};
use crate::error::{Result, TransportError};

/// Keepalive interval for SSH sessions.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Keyboard-interactive rounds answered before giving up.
const MAX_KEYBOARD_INTERACTIVE_ROUNDS: usize = 3;

/// Key exchange offered to old switch firmware.
const LEGACY_KEX: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::ECDH_SHA2_NISTP256,
    kex::DH_GEX_SHA256,
    kex::DH_G14_SHA256,
    kex::DH_GEX_SHA1,
    kex::DH_G14_SHA1,
    kex::DH_G1_SHA1,
];

const LEGACY_CIPHERS: &[cipher::Name] = &[
    cipher::CHACHA20_POLY1305,
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
    cipher::AES_256_CBC,
    cipher::AES_192_CBC,
    cipher::AES_128_CBC,
];

const LEGACY_MACS: &[mac::Name] = &[
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512,
    mac::HMAC_SHA256,
    mac::HMAC_SHA1_ETM,
    mac::HMAC_SHA1,
];

/// Algorithm preferences including legacy algorithms.
fn legacy_preferred() -> Preferred {
    Preferred {
        kex: Cow::Borrowed(LEGACY_KEX),
        cipher: Cow::Borrowed(LEGACY_CIPHERS),
        mac: Cow::Borrowed(LEGACY_MACS),
        ..Preferred::default()
    }
}

/// Interactive shell over an SSH PTY channel.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// The shell channel.
    channel: Channel<Msg>,

    /// Set once the channel reported EOF, close or an exit status.
    closed: bool,
}

impl SshTransport {
    /// Connect to the SSH server, authenticate and start a shell.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: config.socket_timeout,
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            preferred: if config.legacy_algorithms {
                legacy_preferred()
            } else {
                Preferred::default()
            },
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let port = config.port();
        let handler = SshHandler {
            host: config.host.clone(),
            port,
            host_key_verification: config.host_key_verification,
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        let timeout = config.connect_timeout();
        let mut session = tokio::time::timeout(
            timeout,
            client::connect(ssh_config, (config.host.as_str(), port), handler),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout {
            host: config.host.clone(),
            port,
            timeout,
        })?
        .map_err(|e| {
            // If check_server_key stored a detailed error, use that instead
            // of the generic russh::Error::UnknownKey
            match host_key_error.lock().ok().and_then(|mut slot| slot.take()) {
                Some(hk_err) => hk_err,
                None => TransportError::Ssh(e),
            }
        })?;

        Self::authenticate(&mut session, config).await?;

        let channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;
        channel
            .request_pty(
                true,
                "vt100",
                config.terminal_width,
                config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;
        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        debug!("{}: SSH shell channel open", config.target());

        Ok(Self {
            session,
            channel,
            closed: false,
        })
    }

    /// Authenticate with the server: public key first when configured, then
    /// password, then keyboard-interactive answered with the password.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SessionConfig) -> Result<()> {
        let user = config.username.as_str();

        if let Some(key) = &config.private_key {
            let secret = load_secret_key(
                &key.path,
                key.passphrase.as_ref().map(|p| p.expose_secret()),
            )
            .map_err(|e| TransportError::Key(e.to_string()))?;

            // Get the best RSA hash algorithm supported by the server
            let hash_alg = session
                .best_supported_rsa_hash()
                .await
                .map_err(TransportError::Ssh)?
                .flatten();

            let accepted = session
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(secret), hash_alg))
                .await
                .map_err(TransportError::Ssh)?
                .success();
            if accepted {
                return Ok(());
            }
            debug!("{}: public key rejected, trying password", config.target());
        }

        let accepted = session
            .authenticate_password(user, config.password.expose_secret())
            .await
            .map_err(TransportError::Ssh)?
            .success();
        if accepted {
            return Ok(());
        }

        if Self::authenticate_keyboard_interactive(session, config).await? {
            return Ok(());
        }

        Err(TransportError::AuthenticationFailed {
            user: config.username.clone(),
            reason: "invalid username and/or password".to_string(),
        }
        .into())
    }

    async fn authenticate_keyboard_interactive(
        session: &mut Handle<SshHandler>,
        config: &SessionConfig,
    ) -> Result<bool> {
        let mut response = session
            .authenticate_keyboard_interactive_start(config.username.as_str(), None::<String>)
            .await
            .map_err(TransportError::Ssh)?;

        for _ in 0..MAX_KEYBOARD_INTERACTIVE_ROUNDS {
            match response {
                KeyboardInteractiveAuthResponse::Success => return Ok(true),
                KeyboardInteractiveAuthResponse::InfoRequest { ref prompts, .. } => {
                    // Echoed prompts ask for the user name, hidden ones for the password
                    let answers = prompts
                        .iter()
                        .map(|prompt| {
                            if prompt.echo {
                                config.username.clone()
                            } else {
                                config.password.expose_secret().to_string()
                            }
                        })
                        .collect();
                    response = session
                        .authenticate_keyboard_interactive_respond(answers)
                        .await
                        .map_err(TransportError::Ssh)?;
                }
                _ => return Ok(false),
            }
        }

        Ok(false)
    }

    fn died(&mut self, reason: String) -> crate::error::Error {
        self.closed = true;
        TransportError::ProcessDied { reason }.into()
    }
}

impl Transport for SshTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(self.died("shell channel already closed".to_string()));
        }
        self.channel
            .data(data)
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }

    async fn recv(&mut self, wait: Duration) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Err(self.died("shell channel already closed".to_string()));
        }

        let deadline = Instant::now() + wait;
        loop {
            let Ok(msg) = tokio::time::timeout_at(deadline, self.channel.wait()).await else {
                return Ok(None);
            };

            match msg {
                Some(ChannelMsg::Data { data }) => return Ok(Some(data.to_vec())),
                Some(ChannelMsg::ExtendedData { data, .. }) => return Ok(Some(data.to_vec())),
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    return Err(self.died(format!("shell exited with status {exit_status}")));
                }
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    return Err(self.died(format!("shell killed by signal {signal_name:?}")));
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(self.died("channel closed by remote host".to_string()));
                }
                Some(other) => trace!("ignoring channel message {:?}", other),
            }
        }
    }

    fn is_alive(&self) -> bool {
        !self.closed && !self.session.is_closed()
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        if self.session.is_closed() {
            return Ok(());
        }
        if let Err(e) = self.channel.eof().await {
            trace!("failed to send EOF on shell channel: {}", e);
        }
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key for {}: {}", self.host, e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_preferences_offer_sha1_kex() {
        let preferred = legacy_preferred();
        assert!(preferred.kex.contains(&kex::DH_G1_SHA1));
        assert!(preferred.cipher.contains(&cipher::AES_128_CBC));
        assert!(preferred.mac.contains(&mac::HMAC_SHA1));
        assert!(preferred.cipher.iter().all(|alg| *alg != cipher::NONE));
    }
}
