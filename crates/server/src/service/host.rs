//! Tokio task registry for the protocol servers.

use super::{ProtocolServer, ServerKind, ServiceHost};
use crate::config::ServerConfig;
use crate::keys::KeyFingerprintProvider;
use crate::logging;
use async_trait::async_trait;
use bridgeftpd_platform::{BridgeError, BridgeResult};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::debug;

/// Accept loop of one started server.
#[derive(Debug)]
pub struct ServerTask {
    kind: ServerKind,
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerTask {
    pub(crate) fn new(kind: ServerKind, local_addr: SocketAddr, handle: JoinHandle<()>) -> Self {
        Self {
            kind,
            local_addr,
            handle,
        }
    }

    /// Which server.
    pub fn kind(&self) -> ServerKind {
        self.kind
    }

    /// Bound address; differs from the configured one when port 0 was
    /// requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the accept loop is still alive.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Aborts the accept loop and every session it spawned.
    pub fn stop(self) {
        self.handle.abort();
    }
}

/// [`ServiceHost`] keeping one background task per server kind.
///
/// Running means a task is registered and has not finished, so a server
/// whose accept loop died is reported as stopped on the next query.
#[derive(Default)]
pub struct TokioServiceHost {
    servers: HashMap<ServerKind, Arc<dyn ProtocolServer>>,
    running: Mutex<HashMap<ServerKind, ServerTask>>,
}

impl TokioServiceHost {
    /// Empty host; register servers with [`TokioServiceHost::with_server`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `server` under its kind, replacing any previous one.
    pub fn with_server(mut self, server: Arc<dyn ProtocolServer>) -> Self {
        self.servers.insert(server.kind(), server);
        self
    }

    /// Bound address of a running server.
    pub fn local_addr(&self, kind: ServerKind) -> Option<SocketAddr> {
        self.lock()
            .get(&kind)
            .filter(|t| t.is_running())
            .map(ServerTask::local_addr)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ServerKind, ServerTask>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ServiceHost for TokioServiceHost {
    async fn start(
        &self,
        kind: ServerKind,
        config: &ServerConfig,
        fingerprints: Option<&KeyFingerprintProvider>,
    ) -> BridgeResult<()> {
        if self.is_running(kind) {
            return Ok(());
        }
        let server = self
            .servers
            .get(&kind)
            .ok_or_else(|| BridgeError::ServiceStart {
                server: kind.to_string(),
                cause: "no server registered".to_string(),
            })?;

        debug!(server = server.id(), version = server.version(), "starting");
        let task = server.start(config, fingerprints).await?;
        if let Some(stale) = self.lock().insert(kind, task) {
            stale.stop();
        }
        Ok(())
    }

    fn stop(&self, kind: ServerKind) -> bool {
        let was_running = match self.lock().remove(&kind) {
            Some(task) => {
                let alive = task.is_running();
                task.stop();
                alive
            }
            None => false,
        };
        logging::log_server_stopped(kind.as_str(), was_running);
        was_running
    }

    fn is_running(&self, kind: ServerKind) -> bool {
        self.lock()
            .get(&kind)
            .map(ServerTask::is_running)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unregistered_server_fails_to_start() {
        let host = TokioServiceHost::new();
        let config = ServerConfig::default();
        let err = host
            .start(ServerKind::Ftp, &config, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ServiceStart { .. }));
        assert!(!host.is_running(ServerKind::Ftp));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let host = TokioServiceHost::new();
        assert!(!host.stop(ServerKind::Ftp));
        assert!(!host.stop(ServerKind::Ftp));
        assert!(host.local_addr(ServerKind::Sftp).is_none());
    }
}
