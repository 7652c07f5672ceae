//! Scripted transport for exercising sessions without a device.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Connector, SessionConfig, Transport};
use crate::error::{Error, Result, TransportError};

/// Something the fake device does when a scripted line arrives.
#[derive(Debug, Clone)]
pub(crate) enum Event {
    Data(Vec<u8>),
    /// One empty read.
    Silence,
    Error(io::ErrorKind),
    Die,
}

#[derive(Debug)]
struct Step {
    expect: String,
    events: Vec<Event>,
}

/// A fake device shell driven by exact-match rules on written lines.
#[derive(Debug)]
pub(crate) struct ScriptedTransport {
    pending: VecDeque<Event>,
    steps: Vec<Step>,
    writes: Arc<Mutex<Vec<String>>>,
    alive: Arc<AtomicBool>,
    needs_login: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            steps: Vec::new(),
            writes: Arc::new(Mutex::new(Vec::new())),
            alive: Arc::new(AtomicBool::new(true)),
            needs_login: false,
        }
    }

    /// Output available as soon as the transport is opened.
    pub fn emit(mut self, data: &str) -> Self {
        self.pending.push_back(Event::Data(data.as_bytes().to_vec()));
        self
    }

    /// Emit `chunks` once `expect` has been written.
    pub fn on(self, expect: &str, chunks: &[&str]) -> Self {
        let events = chunks
            .iter()
            .map(|chunk| Event::Data(chunk.as_bytes().to_vec()))
            .collect();
        self.on_events(expect, events)
    }

    pub fn on_events(mut self, expect: &str, events: Vec<Event>) -> Self {
        self.steps.push(Step {
            expect: expect.to_string(),
            events,
        });
        self
    }

    /// Behave like Telnet: credentials are typed into the stream.
    pub fn with_login(mut self) -> Self {
        self.needs_login = true;
        self
    }

    /// Everything written to this transport, one entry per send.
    pub fn writes(&self) -> Arc<Mutex<Vec<String>>> {
        self.writes.clone()
    }

    /// Flag that reports liveness; clear it to simulate a dropped peer.
    pub fn alive(&self) -> Arc<AtomicBool> {
        self.alive.clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let line = String::from_utf8_lossy(data).into_owned();
        if let Some(index) = self.steps.iter().position(|step| step.expect == line) {
            let step = self.steps.remove(index);
            self.pending.extend(step.events);
        }
        self.writes.lock().unwrap().push(line);
        Ok(())
    }

    async fn recv(&mut self, wait: Duration) -> Result<Option<Vec<u8>>> {
        match self.pending.pop_front() {
            Some(Event::Data(data)) => Ok(Some(data)),
            Some(Event::Silence) => {
                tokio::time::sleep(wait).await;
                Ok(None)
            }
            Some(Event::Error(kind)) => {
                self.alive.store(false, Ordering::SeqCst);
                Err(TransportError::Io(io::Error::from(kind)).into())
            }
            Some(Event::Die) => {
                self.alive.store(false, Ordering::SeqCst);
                Err(TransportError::ProcessDied {
                    reason: "scripted exit".to_string(),
                }
                .into())
            }
            None => {
                tokio::time::sleep(wait).await;
                Ok(None)
            }
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn needs_login(&self) -> bool {
        self.needs_login
    }

    async fn close(&mut self) -> Result<()> {
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out prepared transports (or errors) in order.
#[derive(Debug, Default)]
pub(crate) struct ScriptedConnector {
    outcomes: Mutex<VecDeque<Result<ScriptedTransport>>>,
    connects: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, transport: ScriptedTransport) -> Self {
        self.outcomes.lock().unwrap().push_back(Ok(transport));
        self
    }

    pub fn then_fail(self, error: Error) -> Self {
        self.outcomes.lock().unwrap().push_back(Err(error));
        self
    }

    /// Number of connection attempts so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self, config: &SessionConfig) -> Result<ScriptedTransport> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.outcomes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Err(TransportError::ConnectionFailed {
                host: config.host.clone(),
                port: config.port(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }
            .into())
        })
    }
}
