//! Transport layer: a bidirectional byte stream to a device shell.
//!
//! The session layer only needs three things from a transport: write bytes,
//! wait a bounded time for bytes, and tell whether the remote end is still
//! there. [`SshTransport`] (russh) and [`TelnetTransport`] (raw TCP with
//! option refusal) provide them; [`Connector`] opens a fresh one on demand so
//! sessions can reconnect.

pub mod config;
mod ssh;
mod telnet;

#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;
use std::time::Duration;

pub use config::{
    HostKeyVerification, LineEnding, PrivateKeyAuth, Protocol, SessionConfig,
};
pub use ssh::SshTransport;
pub use telnet::TelnetTransport;

use crate::error::Result;

/// A connected byte stream to a remote shell.
pub trait Transport: Send {
    /// Write raw bytes to the remote shell.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait up to `wait` for output.
    ///
    /// Returns `Ok(None)` when nothing arrived in time. A remote end that
    /// closed the stream is reported as
    /// [`TransportError::ProcessDied`](crate::error::TransportError::ProcessDied).
    fn recv(&mut self, wait: Duration) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Whether the remote end is believed to be alive.
    fn is_alive(&self) -> bool;

    /// Whether credentials have to be typed into the stream after it opens.
    fn needs_login(&self) -> bool {
        false
    }

    /// Close the stream.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens transports for a session.
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Connect and authenticate at the protocol level.
    fn connect(
        &self,
        config: &SessionConfig,
    ) -> impl Future<Output = Result<Self::Transport>> + Send;
}

/// Connects over SSH or Telnet depending on [`SessionConfig::protocol`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnector;

impl Connector for DefaultConnector {
    type Transport = AnyTransport;

    async fn connect(&self, config: &SessionConfig) -> Result<AnyTransport> {
        match config.protocol {
            Protocol::Ssh => SshTransport::connect(config).await.map(AnyTransport::Ssh),
            Protocol::Telnet => TelnetTransport::connect(config)
                .await
                .map(AnyTransport::Telnet),
        }
    }
}

/// Either of the built-in transports.
pub enum AnyTransport {
    Ssh(SshTransport),
    Telnet(TelnetTransport),
}

impl Transport for AnyTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        match self {
            AnyTransport::Ssh(t) => t.send(data).await,
            AnyTransport::Telnet(t) => t.send(data).await,
        }
    }

    async fn recv(&mut self, wait: Duration) -> Result<Option<Vec<u8>>> {
        match self {
            AnyTransport::Ssh(t) => t.recv(wait).await,
            AnyTransport::Telnet(t) => t.recv(wait).await,
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            AnyTransport::Ssh(t) => t.is_alive(),
            AnyTransport::Telnet(t) => t.is_alive(),
        }
    }

    fn needs_login(&self) -> bool {
        match self {
            AnyTransport::Ssh(t) => t.needs_login(),
            AnyTransport::Telnet(t) => t.needs_login(),
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            AnyTransport::Ssh(t) => t.close().await,
            AnyTransport::Telnet(t) => t.close().await,
        }
    }
}
