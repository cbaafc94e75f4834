//! Local filesystem over FTP and SFTP.
//!
//! This crate exposes one directory tree to remote clients through two
//! protocol servers that share a single set of credentials, one home
//! directory and one notion of file ownership:
//!
//! - **config** - self-healing preference loading into [`config::ServerConfig`]
//! - **vfs** - the native filesystem mapped onto the remote-file contract
//!   the protocol engines consume
//! - **service** - server start/stop decisions and the tokio task registry
//! - **broadcast** - running state pushed to widget, notification and
//!   automation surfaces
//! - **keys** - SFTP host key storage and fingerprints
//!
//! Wire protocols are not implemented here. Each server hands accepted
//! connections to a [`service::ProtocolEngine`] together with a
//! per-session [`vfs::FileSystemView`] and [`service::SessionContext`],
//! which carries the SFTP host key.
//!
//! # Example
//!
//! ```rust,no_run
//! use bridgeftpd_server::config::{self, JsonFilePreferences};
//! use bridgeftpd_server::service::{Orchestrator, TokioServiceHost};
//!
//! # async fn run() -> bridgeftpd_platform::BridgeResult<()> {
//! let prefs = JsonFilePreferences::open("prefs.json")?;
//! let loaded = config::load_config(&prefs);
//! bridgeftpd_server::logging::init(loaded.config.logging);
//!
//! let orchestrator = Orchestrator::new(TokioServiceHost::new());
//! let report = orchestrator.start_servers(&loaded.config, None, None).await;
//! println!("running: {:?}", report.running);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod broadcast;
pub mod config;
pub mod keys;
pub mod logging;
pub mod metrics;
pub mod notice;
pub mod service;
pub mod vfs;

pub use notice::Notice;
