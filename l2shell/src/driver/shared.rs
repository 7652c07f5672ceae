//! A session shared between tasks.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use super::CommandExecutor;
use super::interactive::InteractionScript;
use super::response::Transcript;
use super::session::Session;
use crate::error::Result;
use crate::transport::{Connector, DefaultConnector};

/// A cloneable handle to one device session.
///
/// Commands from all clones are queued on the session lock and run one at a
/// time, in the order the lock is granted. Use [`lock`](Self::lock) to run a
/// sequence of commands without other callers interleaving.
pub struct SharedSession<C: Connector = DefaultConnector> {
    inner: Arc<Mutex<Session<C>>>,
}

impl<C: Connector> Clone for SharedSession<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> SharedSession<C> {
    pub fn new(session: Session<C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Wait for exclusive access to the session.
    pub async fn lock(&self) -> MutexGuard<'_, Session<C>> {
        self.inner.lock().await
    }

    pub async fn execute(
        &self,
        command: &str,
        interactions: &InteractionScript,
    ) -> Result<Transcript> {
        self.inner.lock().await.execute(command, interactions).await
    }

    pub async fn send_command(&self, command: &str) -> Result<Transcript> {
        self.execute(command, &InteractionScript::new()).await
    }

    pub async fn close(&self) {
        self.inner.lock().await.close().await
    }

    pub async fn is_open(&self) -> bool {
        self.inner.lock().await.is_open()
    }
}

impl<C: Connector> From<Session<C>> for SharedSession<C> {
    fn from(session: Session<C>) -> Self {
        Self::new(session)
    }
}

impl<C: Connector> CommandExecutor for SharedSession<C> {
    async fn execute(
        &mut self,
        command: &str,
        interactions: &InteractionScript,
    ) -> Result<Transcript> {
        SharedSession::execute(self, command, interactions).await
    }

    async fn close(&mut self) {
        SharedSession::close(self).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::SessionConfig;
    use crate::transport::mock::{ScriptedConnector, ScriptedTransport};

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_serialized() {
        let transport = ScriptedTransport::new()
            .emit("\r\nsw0#")
            .on("show clock\r\n", &["show clock\r\n12:00\r\n", "sw0#"])
            .on("show hostname\r\n", &["show hostname\r\nsw0\r\n", "sw0#"]);
        let writes = transport.writes();

        let mut config = SessionConfig::new("sw0", "admin", "secret", "#");
        config.transaction_timeout = Duration::from_secs(1);
        let session =
            Session::with_connector(config, ScriptedConnector::new().then(transport)).unwrap();
        let shared = SharedSession::new(session);

        let a = shared.clone();
        let b = shared.clone();
        let (clock, hostname) = tokio::join!(
            async move { a.send_command("show clock").await },
            async move { b.send_command("show hostname").await },
        );

        assert_eq!(clock.unwrap().as_str(), "12:00");
        assert_eq!(hostname.unwrap().as_str(), "sw0");
        assert_eq!(writes.lock().unwrap().len(), 2);
        assert_eq!(shared.lock().await.connector().connects(), 1);
    }
}
