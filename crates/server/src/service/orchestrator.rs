//! Start/stop decisions for the two servers.

use super::{ServerKind, ServerState, ServersRunningState, ServiceHost};
use crate::config::ServerConfig;
use crate::keys::KeyFingerprintProvider;
use crate::logging;
use crate::notice::Notice;
use bridgeftpd_platform::BridgeError;
use tracing::{debug, info};

/// A foreground caller able to prompt the user.
///
/// When one is attached, missing prerequisites are reported as prompts
/// instead of being attempted blindly.
pub trait InteractiveCaller: Send + Sync {
    /// Whether the SFTP host key exists.
    fn is_key_present(&self) -> bool;
}

/// Outcome of [`Orchestrator::start_servers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// Final state of the FTP server
    pub ftp: ServerState,
    /// Final state of the SFTP server
    pub sftp: ServerState,
    /// Running state as read back from the host
    pub running: ServersRunningState,
    /// Notices for the user, in the order they arose
    pub notices: Vec<Notice>,
    /// Host key fingerprints, passed through for display
    pub fingerprints: Option<KeyFingerprintProvider>,
}

impl StartReport {
    fn new(fingerprints: Option<&KeyFingerprintProvider>) -> Self {
        Self {
            ftp: ServerState::Stopped,
            sftp: ServerState::Stopped,
            running: ServersRunningState::default(),
            notices: Vec::new(),
            fingerprints: fingerprints.cloned(),
        }
    }

    fn state_mut(&mut self, kind: ServerKind) -> &mut ServerState {
        match kind {
            ServerKind::Ftp => &mut self.ftp,
            ServerKind::Sftp => &mut self.sftp,
        }
    }
}

/// Starts, stops and queries the servers registered with a [`ServiceHost`].
pub struct Orchestrator<H: ServiceHost> {
    host: H,
}

impl<H: ServiceHost> Orchestrator<H> {
    /// Orchestrator over `host`.
    pub fn new(host: H) -> Self {
        Self { host }
    }

    /// The underlying host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Starts the servers selected by `config`.
    ///
    /// Credentials are checked once for both servers. A missing host key
    /// only skips SFTP, and only when `caller` can prompt for one. FTP
    /// and SFTP starts are attempted independently; a failure of one
    /// never prevents the other.
    pub async fn start_servers(
        &self,
        config: &ServerConfig,
        fingerprints: Option<&KeyFingerprintProvider>,
        caller: Option<&dyn InteractiveCaller>,
    ) -> StartReport {
        let mut report = StartReport::new(fingerprints);

        if !config.is_password_ok() {
            info!("no usable credentials configured, not starting");
            report.notices.push(Notice::CredentialsRequired);
            if caller.is_none() {
                report.notices.push(Notice::OpenSettings);
            }
            report.running = self.check_services_running();
            return report;
        }

        let which = config.server_to_start;
        if which.start_sftp() {
            match caller {
                Some(c) if !c.is_key_present() => {
                    info!("no host key, skipping sftp start");
                    report.notices.push(Notice::GenerateKey);
                }
                _ => {
                    self.start_one(ServerKind::Sftp, config, fingerprints, &mut report)
                        .await
                }
            }
        }
        if which.start_ftp() {
            self.start_one(ServerKind::Ftp, config, fingerprints, &mut report)
                .await;
        }

        report.running = self.check_services_running();
        report
    }

    async fn start_one(
        &self,
        kind: ServerKind,
        config: &ServerConfig,
        fingerprints: Option<&KeyFingerprintProvider>,
        report: &mut StartReport,
    ) {
        *report.state_mut(kind) = ServerState::Starting;
        debug!(server = %kind, "starting");

        match self.host.start(kind, config, fingerprints).await {
            Ok(()) => *report.state_mut(kind) = ServerState::Running,
            Err(e) => {
                *report.state_mut(kind) = ServerState::Stopped;
                let cause = match e {
                    BridgeError::ServiceStart { cause, .. } => cause,
                    other => other.to_string(),
                };
                logging::log_server_start_failed(kind.as_str(), &cause);
                report.notices.push(Notice::StartFailed {
                    server: kind,
                    cause,
                });
            }
        }
    }

    /// Stops both servers. Safe to call when nothing runs.
    pub fn stop_servers(&self) {
        self.host.stop(ServerKind::Ftp);
        self.host.stop(ServerKind::Sftp);
    }

    /// Reads the running state from the host.
    pub fn check_services_running(&self) -> ServersRunningState {
        ServersRunningState {
            ftp: self.host.is_running(ServerKind::Ftp),
            ssh: self.host.is_running(ServerKind::Sftp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerToStart;
    use async_trait::async_trait;
    use bridgeftpd_platform::BridgeResult;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Host recording calls; `fail` kinds refuse to start.
    #[derive(Default)]
    struct FakeHost {
        running: Mutex<HashSet<ServerKind>>,
        fail: HashSet<ServerKind>,
        starts: Mutex<Vec<ServerKind>>,
        fingerprints: Mutex<Vec<Option<KeyFingerprintProvider>>>,
    }

    #[async_trait]
    impl ServiceHost for FakeHost {
        async fn start(
            &self,
            kind: ServerKind,
            _config: &ServerConfig,
            fingerprints: Option<&KeyFingerprintProvider>,
        ) -> BridgeResult<()> {
            self.starts.lock().unwrap().push(kind);
            self.fingerprints.lock().unwrap().push(fingerprints.cloned());
            if self.fail.contains(&kind) {
                return Err(BridgeError::ServiceStart {
                    server: kind.to_string(),
                    cause: "Address already in use".into(),
                });
            }
            self.running.lock().unwrap().insert(kind);
            Ok(())
        }

        fn stop(&self, kind: ServerKind) -> bool {
            self.running.lock().unwrap().remove(&kind)
        }

        fn is_running(&self, kind: ServerKind) -> bool {
            self.running.lock().unwrap().contains(&kind)
        }
    }

    struct Caller {
        key: bool,
    }

    impl InteractiveCaller for Caller {
        fn is_key_present(&self) -> bool {
            self.key
        }
    }

    fn config(which: ServerToStart, password: Option<&str>) -> ServerConfig {
        ServerConfig {
            server_to_start: which,
            password: password.map(str::to_string),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_blank_password_starts_nothing() {
        let orchestrator = Orchestrator::new(FakeHost::default());
        let report = orchestrator
            .start_servers(&config(ServerToStart::All, Some("  ")), None, None)
            .await;

        assert_eq!(
            report.notices,
            vec![Notice::CredentialsRequired, Notice::OpenSettings]
        );
        assert!(orchestrator.host().starts.lock().unwrap().is_empty());
        assert!(!report.running.any_running());
    }

    #[tokio::test]
    async fn test_interactive_caller_gets_no_settings_notice() {
        let orchestrator = Orchestrator::new(FakeHost::default());
        let caller = Caller { key: true };
        let report = orchestrator
            .start_servers(&config(ServerToStart::Ftp, None), None, Some(&caller))
            .await;
        assert_eq!(report.notices, vec![Notice::CredentialsRequired]);
    }

    #[tokio::test]
    async fn test_pub_key_auth_allows_sftp_without_password() {
        let orchestrator = Orchestrator::new(FakeHost::default());
        let mut cfg = config(ServerToStart::Sftp, None);
        cfg.pub_key_auth = true;

        let report = orchestrator.start_servers(&cfg, None, None).await;
        assert_eq!(report.sftp, ServerState::Running);
        assert_eq!(report.ftp, ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_missing_key_skips_only_sftp() {
        let orchestrator = Orchestrator::new(FakeHost::default());
        let caller = Caller { key: false };
        let report = orchestrator
            .start_servers(&config(ServerToStart::All, Some("pw")), None, Some(&caller))
            .await;

        assert_eq!(report.notices, vec![Notice::GenerateKey]);
        assert_eq!(
            report.running,
            ServersRunningState {
                ftp: true,
                ssh: false,
            }
        );
        assert_eq!(
            *orchestrator.host().starts.lock().unwrap(),
            vec![ServerKind::Ftp]
        );
    }

    #[tokio::test]
    async fn test_sftp_failure_does_not_block_ftp() {
        let host = FakeHost {
            fail: [ServerKind::Sftp].into_iter().collect(),
            ..FakeHost::default()
        };
        let orchestrator = Orchestrator::new(host);
        let report = orchestrator
            .start_servers(&config(ServerToStart::All, Some("pw")), None, None)
            .await;

        assert_eq!(report.sftp, ServerState::Stopped);
        assert_eq!(report.ftp, ServerState::Running);
        assert_eq!(
            report.notices,
            vec![Notice::StartFailed {
                server: ServerKind::Sftp,
                cause: "Address already in use".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_stop_servers_is_idempotent() {
        let orchestrator = Orchestrator::new(FakeHost::default());
        orchestrator
            .start_servers(&config(ServerToStart::All, Some("pw")), None, None)
            .await;
        assert!(orchestrator.check_services_running().any_running());

        orchestrator.stop_servers();
        orchestrator.stop_servers();
        assert_eq!(orchestrator.check_services_running(), ServersRunningState::default());
    }

    #[tokio::test]
    async fn test_fingerprints_pass_through() {
        let orchestrator = Orchestrator::new(FakeHost::default());
        let fp = KeyFingerprintProvider::from_public_key_blob(b"key");
        let report = orchestrator
            .start_servers(&config(ServerToStart::All, Some("pw")), Some(&fp), None)
            .await;
        assert_eq!(report.fingerprints, Some(fp.clone()));

        // both servers receive what the report carries
        assert_eq!(
            *orchestrator.host().starts.lock().unwrap(),
            vec![ServerKind::Sftp, ServerKind::Ftp]
        );
        assert_eq!(
            *orchestrator.host().fingerprints.lock().unwrap(),
            vec![Some(fp.clone()), Some(fp)]
        );
    }
}
