//! Telnet transport: raw TCP with in-band option negotiation removed.
//!
//! Every option the server offers or requests is refused (`WILL` is answered
//! with `DONT`, `DO` with `WONT`), which leaves the connection in plain NVT
//! mode. Negotiation and subnegotiation bytes never reach the caller.
//! Authentication happens in-band, so [`Transport::needs_login`] is `true`.

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Transport;
use super::config::SessionConfig;
use crate::error::{Result, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const READ_CHUNK: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Iac,
    Option(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Incremental Telnet command parser.
#[derive(Debug)]
struct IacParser {
    state: State,
}

impl IacParser {
    fn new() -> Self {
        Self { state: State::Data }
    }

    /// Split `input` into application data and the negotiation replies it
    /// calls for. Commands split across reads are completed on the next call.
    fn feed(&mut self, input: &[u8], data: &mut BytesMut, replies: &mut BytesMut) {
        for &byte in input {
            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Iac,
                (State::Data, _) => {
                    data.put_u8(byte);
                    State::Data
                }
                (State::Iac, IAC) => {
                    data.put_u8(IAC);
                    State::Data
                }
                (State::Iac, WILL | WONT | DO | DONT) => State::Option(byte),
                (State::Iac, SB) => State::Subnegotiation,
                // NOP, GA and friends carry no payload
                (State::Iac, _) => State::Data,
                (State::Option(command), option) => {
                    match command {
                        WILL => replies.put_slice(&[IAC, DONT, option]),
                        DO => replies.put_slice(&[IAC, WONT, option]),
                        _ => {}
                    }
                    trace!("telnet: refused option {} (command {})", option, command);
                    State::Data
                }
                (State::Subnegotiation, IAC) => State::SubnegotiationIac,
                (State::Subnegotiation, _) => State::Subnegotiation,
                (State::SubnegotiationIac, SE) => State::Data,
                (State::SubnegotiationIac, _) => State::Subnegotiation,
            };
        }
    }
}

/// Telnet client transport over any async byte stream.
pub struct TelnetTransport<S = TcpStream> {
    stream: S,
    parser: IacParser,
    closed: bool,
}

impl TelnetTransport<TcpStream> {
    /// Open a TCP connection to the configured host.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let port = config.port();
        let timeout = config.connect_timeout();

        let stream = tokio::time::timeout(
            timeout,
            TcpStream::connect((config.host.as_str(), port)),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout {
            host: config.host.clone(),
            port,
            timeout,
        })?
        .map_err(|source| TransportError::ConnectionFailed {
            host: config.host.clone(),
            port,
            source,
        })?;
        stream.set_nodelay(true).map_err(TransportError::Io)?;

        debug!("{}: telnet connection open", config.target());
        Ok(Self::new(stream))
    }
}

impl<S> TelnetTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            parser: IacParser::new(),
            closed: false,
        }
    }

    fn died(&mut self, reason: &str) -> crate::error::Error {
        self.closed = true;
        TransportError::ProcessDied {
            reason: reason.to_string(),
        }
        .into()
    }
}

impl<S> Transport for TelnetTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(self.died("connection already closed"));
        }

        let mut escaped = BytesMut::with_capacity(data.len());
        for &byte in data {
            if byte == IAC {
                escaped.put_u8(IAC);
            }
            escaped.put_u8(byte);
        }

        self.stream
            .write_all(&escaped)
            .await
            .map_err(TransportError::Io)?;
        self.stream.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn recv(&mut self, wait: Duration) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Err(self.died("connection already closed"));
        }

        // A read carrying only negotiation does not end the wait.
        let deadline = tokio::time::Instant::now() + wait;
        let mut raw = [0u8; READ_CHUNK];
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let n = match tokio::time::timeout(remaining, self.stream.read(&mut raw)).await {
                Err(_) => return Ok(None),
                Ok(Ok(0)) => return Err(self.died("connection closed by remote host")),
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    self.closed = true;
                    return Err(TransportError::Io(e).into());
                }
            };

            let mut data = BytesMut::with_capacity(n);
            let mut replies = BytesMut::new();
            self.parser.feed(&raw[..n], &mut data, &mut replies);

            if !replies.is_empty() {
                self.stream
                    .write_all(&replies)
                    .await
                    .map_err(TransportError::Io)?;
            }

            if !data.is_empty() {
                return Ok(Some(data.to_vec()));
            }
            trace!("telnet: read carried only negotiation");
        }
    }

    fn is_alive(&self) -> bool {
        !self.closed
    }

    fn needs_login(&self) -> bool {
        true
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream.shutdown().await.map_err(TransportError::Io)?;
        Ok(())
    }
}
