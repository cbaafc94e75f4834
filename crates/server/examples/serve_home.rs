//! Serve a directory with both servers
//!
//! This example demonstrates how to:
//! - Load a self-healing configuration from a JSON preference file
//! - Generate the SFTP host key on first run
//! - Start both servers through the orchestrator
//! - Push the running state to a status surface
//!
//! No wire protocol ships with this crate, so both servers use a line
//! based listing engine: send a path, receive its `ls -l` listing.
//!
//! Usage:
//!   cargo run --example serve_home [prefs.json] [key_dir]
//!
//! Then, with the default ports:
//!   printf '/\n' | nc 127.0.0.1 12345
//!
//! The first line names the server; the SFTP one adds its host key
//! fingerprint.

use async_trait::async_trait;
use bridgeftpd_platform::{BridgeError, BridgeResult, PreferenceStore};
use bridgeftpd_server::broadcast::{StateBroadcastSink, StatusContent, StatusNotifier};
use bridgeftpd_server::config::{self, JsonFilePreferences, PREF_KEY_PASSWORD};
use bridgeftpd_server::keys::HostKeyStore;
use bridgeftpd_server::logging;
use bridgeftpd_server::metrics::HandleMetrics;
use bridgeftpd_server::service::{
    FtpServer, InteractiveCaller, Orchestrator, ProtocolEngine, SessionContext, SftpServer,
    TokioServiceHost,
};
use bridgeftpd_server::vfs::{FileSystemView, RemoteFile};
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Longest request line accepted.
const MAX_LINE: usize = 4096;

/// Answers every line with the listing of that path.
struct ListingEngine;

#[async_trait]
impl<F: RemoteFile> ProtocolEngine<F> for ListingEngine {
    async fn serve(
        &self,
        stream: TcpStream,
        mut view: FileSystemView<F>,
        session: SessionContext,
    ) -> BridgeResult<()> {
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        let banner = match &session.host_key {
            Some(key) => format!("{} {}\n", session.kind, key.fingerprints().sha256()),
            None => format!("{}\n", session.kind),
        };
        write.write_all(banner.as_bytes()).await?;

        while let Some(line) = lines.next_line().await? {
            if line.len() > MAX_LINE {
                return Err(BridgeError::Protocol(format!(
                    "request longer than {} bytes",
                    MAX_LINE
                )));
            }
            let line = line.trim();
            if let Some(dir) = line.strip_prefix("cd ") {
                let reply = if view.change_working_directory(dir).await {
                    "250 ok\n"
                } else {
                    "550 no such directory\n"
                };
                write.write_all(reply.as_bytes()).await?;
                continue;
            }

            let target = view.file(line).await;
            let entries = if target.node().is_directory() {
                target.list().await
            } else {
                vec![target]
            };
            for entry in entries.iter().filter(|e| e.node().exists()) {
                write.write_all(entry.list_line().as_bytes()).await?;
                write.write_all(b"\n").await?;
            }
            write.write_all(b".\n").await?;
        }
        Ok(())
    }
}

/// Prints the status notification to stdout.
struct ConsoleNotifier;

impl StatusNotifier for ConsoleNotifier {
    fn show(&self, content: &StatusContent) -> BridgeResult<()> {
        println!("{}\n{}", content.title, content.body());
        Ok(())
    }

    fn remove(&self) -> BridgeResult<()> {
        println!("Servers stopped");
        Ok(())
    }
}

struct Console(HostKeyStore);

impl InteractiveCaller for Console {
    fn is_key_present(&self) -> bool {
        self.0.is_key_present()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let prefs_path = args.get(1).map(String::as_str).unwrap_or("bridgeftpd.json");
    let key_dir = args.get(2).map(String::as_str).unwrap_or(".bridgeftpd");

    let prefs = JsonFilePreferences::open(prefs_path)?;
    if prefs.get_string(PREF_KEY_PASSWORD).is_none() {
        prefs.put_string(PREF_KEY_PASSWORD, "changeme")?;
        println!("No password set, using 'changeme'");
    }

    let loaded = config::load_config(&prefs);
    logging::init(true);
    for notice in &loaded.notices {
        println!("{}", notice);
    }

    let keys = HostKeyStore::new(key_dir);
    if !keys.is_key_present() {
        keys.generate()?;
    }

    let metrics = HandleMetrics::new();
    let host = TokioServiceHost::new()
        .with_server(Arc::new(FtpServer::new(
            Arc::new(ListingEngine),
            metrics.clone(),
        )))
        .with_server(Arc::new(SftpServer::new(
            Arc::new(ListingEngine),
            keys.clone(),
            metrics.clone(),
        )));
    let orchestrator = Orchestrator::new(host);
    let sink = StateBroadcastSink::new().with_notifier(Box::new(ConsoleNotifier));

    let caller = Console(keys.clone());
    let report = orchestrator
        .start_servers(&loaded.config, keys.fingerprints().as_ref(), Some(&caller))
        .await;
    for notice in &report.notices {
        println!("{}", notice);
    }
    let content = StatusContent::new(
        &loaded.config,
        report.running,
        "127.0.0.1",
        report.fingerprints.as_ref(),
    );
    sink.broadcast(report.running, &content);

    if report.running.any_running() {
        println!("Press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
    }

    orchestrator.stop_servers();
    let state = orchestrator.check_services_running();
    let content = StatusContent::new(&loaded.config, state, "127.0.0.1", None);
    sink.broadcast(state, &content);
    println!("{:?}", metrics.snapshot());
    Ok(())
}
