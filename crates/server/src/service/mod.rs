//! Server lifecycle.
//!
//! Each protocol server runs as its own tokio task behind a
//! [`ServiceHost`]. The [`Orchestrator`] decides which servers may start,
//! starts and stops them through the host and reports the outcome as a
//! [`StartReport`]; it never touches UI surfaces itself.
//!
//! # Example
//!
//! ```rust,no_run
//! use bridgeftpd_server::config::ServerConfig;
//! use bridgeftpd_server::service::{Orchestrator, TokioServiceHost};
//!
//! # async fn run(host: TokioServiceHost, config: ServerConfig) {
//! let orchestrator = Orchestrator::new(host);
//! let report = orchestrator.start_servers(&config, None, None).await;
//! for notice in &report.notices {
//!     println!("{}", notice);
//! }
//! assert_eq!(report.running, orchestrator.check_services_running());
//! # }
//! ```

mod host;
mod orchestrator;
mod server;

pub use host::{ServerTask, TokioServiceHost};
pub use orchestrator::{InteractiveCaller, Orchestrator, StartReport};
pub use server::{FtpServer, SftpServer};

use crate::config::ServerConfig;
use crate::keys::{HostKey, KeyFingerprintProvider};
use crate::vfs::{FileSystemView, RemoteFile};
use async_trait::async_trait;
use bridgeftpd_platform::{BridgeResult, ServerModule};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;

/// The two protocol servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerKind {
    /// Plaintext FTP
    Ftp,
    /// SFTP over SSH
    Sftp,
}

impl ServerKind {
    /// Short lowercase name used in logs and notices.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerKind::Ftp => "ftp",
            ServerKind::Sftp => "sftp",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    /// Not running
    #[default]
    Stopped,
    /// Start requested
    Starting,
    /// Accepting connections
    Running,
}

/// Running state of both servers, derived from the live registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServersRunningState {
    /// FTP server running
    pub ftp: bool,
    /// SFTP server running
    pub ssh: bool,
}

impl ServersRunningState {
    /// Whether at least one server runs.
    pub fn any_running(&self) -> bool {
        self.ftp || self.ssh
    }
}

/// Per-connection facts handed to a [`ProtocolEngine`] with the socket.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Server that accepted the connection
    pub kind: ServerKind,
    /// Remote address
    pub peer: SocketAddr,
    /// Host key loaded when the SFTP server started; `None` for FTP
    pub host_key: Option<Arc<HostKey>>,
    /// Fingerprints shown to the user for that key
    pub fingerprints: Option<KeyFingerprintProvider>,
}

/// Speaks a wire protocol over one accepted connection.
///
/// The engine owns the session: authentication, command parsing and data
/// transfer. All file access goes through the supplied view. An SFTP
/// engine signs with `session.host_key`, the same key whose presence
/// allowed the server to start. Returning (or being cancelled) ends the
/// session and drops every handle it holds.
#[async_trait]
pub trait ProtocolEngine<F: RemoteFile>: Send + Sync + 'static {
    /// Serves one client until it disconnects.
    async fn serve(
        &self,
        stream: TcpStream,
        view: FileSystemView<F>,
        session: SessionContext,
    ) -> BridgeResult<()>;
}

/// A protocol server that can be started on the configured port.
#[async_trait]
pub trait ProtocolServer: ServerModule {
    /// Which server this is.
    fn kind(&self) -> ServerKind;

    /// Binds the listener and spawns the accept loop.
    ///
    /// `fingerprints` is what the user was shown for the host key; every
    /// session receives it.
    ///
    /// # Errors
    ///
    /// `BridgeError::ServiceStart` when the port cannot be bound or a
    /// prerequisite (such as the host key) is missing
    async fn start(
        &self,
        config: &ServerConfig,
        fingerprints: Option<&KeyFingerprintProvider>,
    ) -> BridgeResult<ServerTask>;
}

/// Registry of running servers.
#[async_trait]
pub trait ServiceHost: Send + Sync {
    /// Starts `kind`, passing `fingerprints` on to the server. Starting a
    /// running server is a no-op.
    async fn start(
        &self,
        kind: ServerKind,
        config: &ServerConfig,
        fingerprints: Option<&KeyFingerprintProvider>,
    ) -> BridgeResult<()>;

    /// Stops `kind`; returns whether it was running. Idempotent.
    fn stop(&self, kind: ServerKind) -> bool;

    /// Whether `kind` is running right now.
    fn is_running(&self, kind: ServerKind) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_kind_display() {
        assert_eq!(ServerKind::Ftp.to_string(), "ftp");
        assert_eq!(ServerKind::Sftp.to_string(), "sftp");
    }

    #[test]
    fn test_any_running() {
        assert!(!ServersRunningState::default().any_running());
        assert!(ServersRunningState {
            ftp: false,
            ssh: true
        }
        .any_running());
    }
}
