//! Structured logging for server lifecycle and filesystem events
//!
//! Provides structured, contextual logging using the `tracing` framework.
//!
//! # Log Levels
//!
//! - **DEBUG**: Filesystem adapter calls, handle acquisition and release
//! - **INFO**: Server start/stop, configuration corrections
//! - **WARN**: Best-effort failures (UI surfaces, write-back of preferences)
//! - **ERROR**: Server start failures
//!
//! # Example
//!
//! ```no_run
//! use bridgeftpd_server::logging;
//!
//! // Install the subscriber when the logging preference is on
//! logging::init(true);
//!
//! logging::log_server_started("ftp", 12345);
//! ```

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG`
pub const LOG_ENV: &str = "BRIDGEFTPD_LOG";

const DEFAULT_FILTER: &str = "bridgeftpd_server=info";

/// Install a global fmt subscriber.
///
/// Does nothing when `enabled` is false or when a subscriber is already
/// installed. Returns whether this call installed one.
pub fn init(enabled: bool) -> bool {
    if !enabled {
        return false;
    }

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Log a server start
///
/// # Arguments
///
/// * `server` - "ftp" or "sftp"
/// * `port` - Listen port
pub fn log_server_started(server: &str, port: u16) {
    info!(server = server, port = port, "server started");
}

/// Log a server start failure
///
/// # Arguments
///
/// * `server` - "ftp" or "sftp"
/// * `error` - Underlying cause
pub fn log_server_start_failed(server: &str, error: &str) {
    error!(server = server, error = error, "could not start server");
}

/// Log a server stop request
pub fn log_server_stopped(server: &str, was_running: bool) {
    info!(
        server = server,
        was_running = was_running,
        "server stop requested"
    );
}

/// Log a port replaced by its default
///
/// # Arguments
///
/// * `key` - Preference key
/// * `invalid` - Value found in the store
/// * `replacement` - Default written back
pub fn log_port_corrected(key: &str, invalid: i64, replacement: u16) {
    info!(
        key = key,
        invalid = invalid,
        replacement = replacement,
        "port out of range, reset to default"
    );
}

/// Log a UI surface that could not be updated
pub fn log_surface_failed(surface: &str, error: &str) {
    warn!(surface = surface, error = error, "could not update surface");
}

/// Log a client session
///
/// # Arguments
///
/// * `server` - "ftp" or "sftp"
/// * `peer` - Remote address
/// * `event` - "opened" or "closed"
pub fn log_session(server: &str, peer: &str, event: &str) {
    debug!(
        server = server,
        peer = peer,
        event = event,
        "client session"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_init_installs_nothing() {
        assert!(!init(false));
    }
}
