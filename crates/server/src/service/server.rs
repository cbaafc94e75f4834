//! FTP and SFTP listeners.

use super::{ProtocolEngine, ProtocolServer, ServerKind, ServerTask, SessionContext};
use crate::config::ServerConfig;
use crate::keys::{HostKey, HostKeyStore, KeyFingerprintProvider};
use crate::logging;
use crate::metrics::HandleMetrics;
use crate::vfs::{FileSystemView, FtpFile, PrincipalContext, RemoteFile, SftpFile};
use async_trait::async_trait;
use bridgeftpd_platform::{BridgeError, BridgeResult, ServerModule};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Pause after a failed accept, so fd exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Plaintext FTP server on `config.port`.
pub struct FtpServer {
    engine: Arc<dyn ProtocolEngine<FtpFile>>,
    bind_address: IpAddr,
    metrics: HandleMetrics,
}

impl FtpServer {
    /// Server handing each connection to `engine`, listening on all
    /// interfaces.
    pub fn new(engine: Arc<dyn ProtocolEngine<FtpFile>>, metrics: HandleMetrics) -> Self {
        Self {
            engine,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            metrics,
        }
    }

    /// Listen on `addr` only.
    pub fn with_bind_address(mut self, addr: IpAddr) -> Self {
        self.bind_address = addr;
        self
    }
}

impl ServerModule for FtpServer {
    fn id(&self) -> &'static str {
        "ftp"
    }

    fn description(&self) -> &'static str {
        "FTP server exposing the start directory"
    }
}

#[async_trait]
impl ProtocolServer for FtpServer {
    fn kind(&self) -> ServerKind {
        ServerKind::Ftp
    }

    async fn start(
        &self,
        config: &ServerConfig,
        fingerprints: Option<&KeyFingerprintProvider>,
    ) -> BridgeResult<ServerTask> {
        let addr = SocketAddr::new(self.bind_address, config.port);
        let identity = Identity {
            host_key: None,
            fingerprints: fingerprints.cloned(),
        };
        spawn_listener(
            ServerKind::Ftp,
            addr,
            Arc::clone(&self.engine),
            config,
            identity,
            self.metrics.clone(),
        )
        .await
    }
}

/// SFTP server on `config.secure_port`. Refuses to start without a host
/// key; the key loaded at start signs every session of that run.
pub struct SftpServer {
    engine: Arc<dyn ProtocolEngine<SftpFile>>,
    keys: HostKeyStore,
    bind_address: IpAddr,
    metrics: HandleMetrics,
}

impl SftpServer {
    /// Server handing each connection to `engine`, listening on all
    /// interfaces.
    pub fn new(
        engine: Arc<dyn ProtocolEngine<SftpFile>>,
        keys: HostKeyStore,
        metrics: HandleMetrics,
    ) -> Self {
        Self {
            engine,
            keys,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            metrics,
        }
    }

    /// Listen on `addr` only.
    pub fn with_bind_address(mut self, addr: IpAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// The host key store.
    pub fn keys(&self) -> &HostKeyStore {
        &self.keys
    }
}

impl ServerModule for SftpServer {
    fn id(&self) -> &'static str {
        "sftp"
    }

    fn description(&self) -> &'static str {
        "SFTP server exposing the start directory"
    }
}

#[async_trait]
impl ProtocolServer for SftpServer {
    fn kind(&self) -> ServerKind {
        ServerKind::Sftp
    }

    async fn start(
        &self,
        config: &ServerConfig,
        fingerprints: Option<&KeyFingerprintProvider>,
    ) -> BridgeResult<ServerTask> {
        let key = self.keys.load().map_err(|e| BridgeError::ServiceStart {
            server: ServerKind::Sftp.to_string(),
            cause: format!("host key unavailable: {}", e),
        })?;
        let loaded = key.fingerprints();
        debug!(fingerprint = %loaded.sha256(), "host key loaded");
        if let Some(shown) = fingerprints.filter(|shown| **shown != loaded) {
            warn!(
                shown = %shown.sha256(),
                loaded = %loaded.sha256(),
                "host key changed after its fingerprints were read"
            );
        }

        let addr = SocketAddr::new(self.bind_address, config.secure_port);
        let identity = Identity {
            host_key: Some(Arc::new(key)),
            fingerprints: Some(loaded),
        };
        spawn_listener(
            ServerKind::Sftp,
            addr,
            Arc::clone(&self.engine),
            config,
            identity,
            self.metrics.clone(),
        )
        .await
    }
}

/// Key material shared by every session of one server run.
#[derive(Clone)]
struct Identity {
    host_key: Option<Arc<HostKey>>,
    fingerprints: Option<KeyFingerprintProvider>,
}

async fn spawn_listener<F: RemoteFile>(
    kind: ServerKind,
    addr: SocketAddr,
    engine: Arc<dyn ProtocolEngine<F>>,
    config: &ServerConfig,
    identity: Identity,
    metrics: HandleMetrics,
) -> BridgeResult<ServerTask> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| BridgeError::ServiceStart {
            server: kind.to_string(),
            cause: e.to_string(),
        })?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(accept_loop(
        kind,
        listener,
        engine,
        Arc::new(config.clone()),
        identity,
        metrics,
    ));
    logging::log_server_started(kind.as_str(), local_addr.port());
    Ok(ServerTask::new(kind, local_addr, handle))
}

/// Runs until aborted. Aborting drops the session set, which cancels every
/// session and with it every open handle.
async fn accept_loop<F: RemoteFile>(
    kind: ServerKind,
    listener: TcpListener,
    engine: Arc<dyn ProtocolEngine<F>>,
    config: Arc<ServerConfig>,
    identity: Identity,
    metrics: HandleMetrics,
) {
    let principal = PrincipalContext::new(config.user_name.as_str());
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let view = FileSystemView::new(&config, principal.clone(), metrics.clone());
                    let engine = Arc::clone(&engine);
                    let session = SessionContext {
                        kind,
                        peer,
                        host_key: identity.host_key.clone(),
                        fingerprints: identity.fingerprints.clone(),
                    };
                    let guard = SessionGuard::open(kind, peer, metrics.clone());
                    sessions.spawn(async move {
                        let _guard = guard;
                        if let Err(e) = engine.serve(stream, view, session).await {
                            warn!(
                                server = %kind,
                                peer = %peer,
                                error = %e,
                                "session ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    warn!(server = %kind, error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
        }
    }
}

/// Counts a session from accept until its task ends or is cancelled.
struct SessionGuard {
    kind: ServerKind,
    peer: SocketAddr,
    metrics: HandleMetrics,
}

impl SessionGuard {
    fn open(kind: ServerKind, peer: SocketAddr, metrics: HandleMetrics) -> Self {
        metrics.record_session_started();
        logging::log_session(kind.as_str(), &peer.to_string(), "opened");
        Self {
            kind,
            peer,
            metrics,
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.metrics.record_session_ended();
        logging::log_session(self.kind.as_str(), &self.peer.to_string(), "closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    struct Greeter;

    #[async_trait]
    impl ProtocolEngine<FtpFile> for Greeter {
        async fn serve(
            &self,
            mut stream: TcpStream,
            view: FileSystemView<FtpFile>,
            _session: SessionContext,
        ) -> BridgeResult<()> {
            let line = format!("220 {}\r\n", view.principal().name());
            stream.write_all(line.as_bytes()).await?;
            Ok(())
        }
    }

    /// Keeps the context of every session and closes the connection.
    #[derive(Default)]
    struct Recorder(Mutex<Vec<SessionContext>>);

    impl Recorder {
        fn sessions(&self) -> Vec<SessionContext> {
            self.0.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<F: RemoteFile> ProtocolEngine<F> for Recorder {
        async fn serve(
            &self,
            mut stream: TcpStream,
            _view: FileSystemView<F>,
            session: SessionContext,
        ) -> BridgeResult<()> {
            self.0.lock().unwrap().push(session);
            stream.write_all(b"bye\n").await?;
            Ok(())
        }
    }

    async fn connect_once(addr: SocketAddr) -> SocketAddr {
        let mut client = TcpStream::connect(addr).await.unwrap();
        let local = client.local_addr().unwrap();
        let mut reply = String::new();
        client.read_to_string(&mut reply).await.unwrap();
        assert_eq!(reply, "bye\n");
        local
    }

    fn loopback_config(dir: &std::path::Path) -> ServerConfig {
        let mut config = ServerConfig::builder()
            .with_start_dir(dir)
            .with_user_name("tester")
            .build()
            .unwrap();
        config.port = 0;
        config.secure_port = 0;
        config
    }

    #[tokio::test]
    async fn test_ftp_server_serves_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = HandleMetrics::new();
        let server = FtpServer::new(Arc::new(Greeter), metrics.clone())
            .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST));

        let task = server
            .start(&loopback_config(dir.path()), None)
            .await
            .unwrap();
        assert!(task.is_running());

        let mut client = TcpStream::connect(task.local_addr()).await.unwrap();
        let mut greeting = String::new();
        client.read_to_string(&mut greeting).await.unwrap();
        assert_eq!(greeting, "220 tester\r\n");

        task.stop();
        assert_eq!(metrics.snapshot().sessions_total, 1);
    }

    #[tokio::test]
    async fn test_port_in_use_is_start_error() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = loopback_config(dir.path());
        config.port = taken.local_addr().unwrap().port();

        let server = FtpServer::new(Arc::new(Greeter), HandleMetrics::new())
            .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST));
        match server.start(&config, None).await {
            Err(BridgeError::ServiceStart { server, .. }) => assert_eq!(server, "ftp"),
            other => panic!("expected start error, got {:?}", other.map(|t| t.local_addr())),
        }
    }

    #[tokio::test]
    async fn test_sftp_requires_host_key() {
        let dir = tempfile::tempdir().unwrap();
        let keys = HostKeyStore::new(dir.path().join("keys"));
        let engine = Arc::new(Recorder::default());
        let server = SftpServer::new(engine, keys.clone(), HandleMetrics::new())
            .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let config = loopback_config(dir.path());

        let err = server.start(&config, None).await.unwrap_err();
        assert!(err.to_string().contains("host key unavailable"));

        keys.generate().unwrap();
        let task = server.start(&config, None).await.unwrap();
        assert_eq!(task.kind(), ServerKind::Sftp);
        task.stop();
    }

    #[tokio::test]
    async fn test_sftp_sessions_get_the_started_host_key() {
        let dir = tempfile::tempdir().unwrap();
        let keys = HostKeyStore::new(dir.path().join("keys"));
        keys.generate().unwrap();
        let shown = keys.fingerprints();

        let engine = Arc::new(Recorder::default());
        let server = SftpServer::new(engine.clone(), keys.clone(), HandleMetrics::new())
            .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let task = server
            .start(&loopback_config(dir.path()), shown.as_ref())
            .await
            .unwrap();

        // a key rotated on disk does not reach sessions of this run
        keys.generate().unwrap();
        assert_ne!(keys.fingerprints(), shown);

        let first = connect_once(task.local_addr()).await;
        let second = connect_once(task.local_addr()).await;
        task.stop();

        let sessions = engine.sessions();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].peer, first);
        assert_eq!(sessions[1].peer, second);
        for session in &sessions {
            assert_eq!(session.kind, ServerKind::Sftp);
            let key = session.host_key.as_ref().unwrap();
            assert_eq!(Some(key.fingerprints()), shown);
            assert_eq!(session.fingerprints, shown);
        }
        assert!(Arc::ptr_eq(
            sessions[0].host_key.as_ref().unwrap(),
            sessions[1].host_key.as_ref().unwrap()
        ));
    }

    #[tokio::test]
    async fn test_ftp_sessions_get_fingerprints_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let fingerprints = KeyFingerprintProvider::from_public_key_blob(b"shown");
        let engine = Arc::new(Recorder::default());
        let server = FtpServer::new(engine.clone(), HandleMetrics::new())
            .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let task = server
            .start(&loopback_config(dir.path()), Some(&fingerprints))
            .await
            .unwrap();

        connect_once(task.local_addr()).await;
        task.stop();

        let sessions = engine.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].kind, ServerKind::Ftp);
        assert!(sessions[0].host_key.is_none());
        assert_eq!(sessions[0].fingerprints, Some(fingerprints));
    }
}
