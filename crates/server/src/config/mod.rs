//! Server configuration.
//!
//! [`ServerConfig`] is an immutable value loaded from a [`PreferenceStore`]
//! by [`load_config`] and then threaded explicitly into the orchestrator,
//! the servers and every filesystem view.
//!
//! Loading is self-healing: every key has a default, malformed port strings
//! fall back silently, and out-of-range ports are replaced by the protocol
//! default which is written back under the same key.
//!
//! # Example
//!
//! ```
//! use bridgeftpd_server::config::{self, MemoryPreferences, PREF_KEY_PORT};
//! use bridgeftpd_platform::PreferenceStore;
//!
//! let prefs = MemoryPreferences::new();
//! prefs.put_string(PREF_KEY_PORT, "80").unwrap();
//!
//! let loaded = config::load_config(&prefs);
//! assert_eq!(loaded.config.port, config::PORT_DEFAULT_VAL);
//! assert_eq!(prefs.get_string(PREF_KEY_PORT).as_deref(), Some("12345"));
//! ```

mod store;

pub use store::{JsonFilePreferences, MemoryPreferences};

use crate::logging;
use crate::notice::Notice;
use bridgeftpd_platform::{BridgeError, BridgeResult, PreferenceStore};
use std::path::PathBuf;
use tracing::{info, warn};

/// User name
pub const PREF_KEY_USER: &str = "userNamePref";
/// Password
pub const PREF_KEY_PASSWORD: &str = "passwordPref";
/// Plaintext (FTP) port
pub const PREF_KEY_PORT: &str = "portPref";
/// Secure (SFTP) port
pub const PREF_KEY_SECURE_PORT: &str = "securePortPref";
/// Start (home) directory
pub const PREF_KEY_START_DIR: &str = "startDirPref";
/// Announce servers on the local network
pub const PREF_KEY_ANNOUNCE: &str = "announcePref";
/// Keep the device awake while running
pub const PREF_KEY_WAKELOCK: &str = "wakelockPref";
/// Which server(s) to start
pub const PREF_KEY_WHICH_SERVER: &str = "whichServerToStartPref";
/// UI theme
pub const PREF_KEY_THEME: &str = "themePref";
/// Logging switch
pub const PREF_KEY_LOGGING: &str = "loggingPref";
/// Public key authentication switch (SFTP only)
pub const PREF_KEY_PUB_KEY_AUTH: &str = "pubKeyAuthPref";

/// Default plaintext port
pub const PORT_DEFAULT_VAL: u16 = 12345;
/// Default secure port
pub const SECURE_PORT_DEFAULT_VAL: u16 = 1234;
/// Default user name
pub const USER_DEFAULT_VAL: &str = "user";

/// Which protocol server(s) a start request launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerToStart {
    /// FTP and SFTP
    #[default]
    All,
    /// FTP only
    Ftp,
    /// SFTP only
    Sftp,
}

impl ServerToStart {
    /// Value stored in the preference store.
    pub fn xml_value(&self) -> &'static str {
        match self {
            ServerToStart::All => "ALL",
            ServerToStart::Ftp => "FTP",
            ServerToStart::Sftp => "SFTP",
        }
    }

    /// Parses a stored value; unknown values select both servers.
    pub fn by_xml_value(value: &str) -> Self {
        match value {
            "FTP" => ServerToStart::Ftp,
            "SFTP" => ServerToStart::Sftp,
            _ => ServerToStart::All,
        }
    }

    /// Whether the FTP server is selected.
    pub fn start_ftp(&self) -> bool {
        matches!(self, ServerToStart::All | ServerToStart::Ftp)
    }

    /// Whether the SFTP server is selected.
    pub fn start_sftp(&self) -> bool {
        matches!(self, ServerToStart::All | ServerToStart::Sftp)
    }

    /// Whether a password is required for the selected servers.
    ///
    /// FTP always authenticates by password. SFTP alone can do without one
    /// when public key authentication is enabled.
    pub fn is_password_mandatory(&self, config: &ServerConfig) -> bool {
        match self {
            ServerToStart::All | ServerToStart::Ftp => true,
            ServerToStart::Sftp => !config.pub_key_auth,
        }
    }
}

/// UI theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    /// Dark theme
    #[default]
    Dark,
    /// Light theme
    Light,
}

impl Theme {
    /// Value stored in the preference store.
    pub fn xml_value(&self) -> &'static str {
        match self {
            Theme::Dark => "DARK",
            Theme::Light => "LIGHT",
        }
    }

    /// Parses a stored value; unknown values select the dark theme.
    pub fn by_xml_value(value: &str) -> Self {
        match value {
            "LIGHT" => Theme::Light,
            _ => Theme::Dark,
        }
    }
}

/// Immutable server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// User name clients log in with
    pub user_name: String,
    /// Password; `None` means no password authentication is configured
    pub password: Option<String>,
    /// FTP listen port
    pub port: u16,
    /// SFTP listen port
    pub secure_port: u16,
    /// Home directory presented to clients
    pub start_dir: PathBuf,
    /// Announce servers on the local network
    pub announce: bool,
    /// Keep the device awake while a server runs
    pub wakelock: bool,
    /// Which server(s) to start
    pub server_to_start: ServerToStart,
    /// UI theme
    pub theme: Theme,
    /// Write logs
    pub logging: bool,
    /// Accept SFTP public key authentication
    pub pub_key_auth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            user_name: USER_DEFAULT_VAL.to_string(),
            password: None,
            port: PORT_DEFAULT_VAL,
            secure_port: SECURE_PORT_DEFAULT_VAL,
            start_dir: default_start_dir(),
            announce: false,
            wakelock: true,
            server_to_start: ServerToStart::All,
            theme: Theme::Dark,
            logging: false,
            pub_key_auth: false,
        }
    }
}

impl ServerConfig {
    /// Create builder for a configuration
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Whether an authentication mechanism usable by the selected servers
    /// is configured.
    pub fn is_password_ok(&self) -> bool {
        if !self.server_to_start.is_password_mandatory(self) {
            return true;
        }
        self.password
            .as_deref()
            .map(|p| !p.trim().is_empty())
            .unwrap_or(false)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a port is out of range or the user name is empty
    pub fn validate(&self) -> BridgeResult<()> {
        if self.user_name.is_empty() {
            return Err(BridgeError::Config("user name cannot be empty".into()));
        }
        if !validate_port(i64::from(self.port)) {
            return Err(BridgeError::Config(format!("invalid port: {}", self.port)));
        }
        if !validate_port(i64::from(self.secure_port)) {
            return Err(BridgeError::Config(format!(
                "invalid secure port: {}",
                self.secure_port
            )));
        }
        Ok(())
    }
}

/// Builder for [`ServerConfig`], used by embedders that configure the
/// servers programmatically instead of through a preference store.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Create new builder holding the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set user name
    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.config.user_name = name.into();
        self
    }

    /// Set password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set FTP port
    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set SFTP port
    pub fn with_secure_port(mut self, port: u16) -> Self {
        self.config.secure_port = port;
        self
    }

    /// Set home directory
    pub fn with_start_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.start_dir = dir.into();
        self
    }

    /// Set which servers to start
    pub fn with_server_to_start(mut self, which: ServerToStart) -> Self {
        self.config.server_to_start = which;
        self
    }

    /// Enable or disable public key authentication
    pub fn with_pub_key_auth(mut self, enabled: bool) -> Self {
        self.config.pub_key_auth = enabled;
        self
    }

    /// Enable or disable logging
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.config.logging = enabled;
        self
    }

    /// Build the configuration with validation
    ///
    /// # Errors
    ///
    /// Returns an error if [`ServerConfig::validate`] fails
    pub fn build(self) -> BridgeResult<ServerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Result of loading the configuration from a store.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The loaded configuration
    pub config: ServerConfig,
    /// Notices produced while self-healing invalid values
    pub notices: Vec<Notice>,
}

/// Returns true if `port` is usable: `1024 < port < 64000`.
pub fn validate_port(port: i64) -> bool {
    port > 1024 && port < 64000
}

fn default_start_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Loads every setting with its default and validates both ports.
pub fn load_config(prefs: &dyn PreferenceStore) -> LoadedConfig {
    let mut notices = Vec::new();

    let (port, notice) = load_and_validate_port_insecure(prefs);
    notices.extend(notice);
    let (secure_port, notice) = load_and_validate_port_secure(prefs);
    notices.extend(notice);

    let config = ServerConfig {
        user_name: prefs
            .get_string(PREF_KEY_USER)
            .unwrap_or_else(|| USER_DEFAULT_VAL.to_string()),
        password: prefs.get_string(PREF_KEY_PASSWORD),
        port,
        secure_port,
        start_dir: prefs
            .get_string(PREF_KEY_START_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_start_dir),
        announce: prefs.get_bool(PREF_KEY_ANNOUNCE).unwrap_or(false),
        wakelock: prefs.get_bool(PREF_KEY_WAKELOCK).unwrap_or(true),
        server_to_start: prefs
            .get_string(PREF_KEY_WHICH_SERVER)
            .map(|v| ServerToStart::by_xml_value(&v))
            .unwrap_or_default(),
        theme: prefs
            .get_string(PREF_KEY_THEME)
            .map(|v| Theme::by_xml_value(&v))
            .unwrap_or_default(),
        logging: prefs.get_bool(PREF_KEY_LOGGING).unwrap_or(false),
        pub_key_auth: prefs.get_bool(PREF_KEY_PUB_KEY_AUTH).unwrap_or(false),
    };

    LoadedConfig { config, notices }
}

/// Loads and validates the FTP port.
pub fn load_and_validate_port_insecure(prefs: &dyn PreferenceStore) -> (u16, Option<Notice>) {
    load_and_validate_port(prefs, PREF_KEY_PORT, PORT_DEFAULT_VAL)
}

/// Loads and validates the SFTP port.
pub fn load_and_validate_port_secure(prefs: &dyn PreferenceStore) -> (u16, Option<Notice>) {
    load_and_validate_port(prefs, PREF_KEY_SECURE_PORT, SECURE_PORT_DEFAULT_VAL)
}

fn load_and_validate_port(
    prefs: &dyn PreferenceStore,
    key: &'static str,
    default_val: u16,
) -> (u16, Option<Notice>) {
    let raw = prefs
        .get_string(key)
        .unwrap_or_else(|| default_val.to_string());

    let parsed = match raw.parse::<i64>() {
        Ok(port) => port,
        Err(_) => {
            info!(key = key, value = %raw, "could not parse port, using default");
            i64::from(default_val)
        }
    };

    if validate_port(parsed) {
        // in range, so it fits
        return (parsed as u16, None);
    }

    logging::log_port_corrected(key, parsed, default_val);
    if let Err(e) = prefs.put_string(key, &default_val.to_string()) {
        warn!(key = key, error = %e, "could not persist corrected port");
    }
    (
        default_val,
        Some(Notice::PortInvalid {
            key,
            replacement: default_val,
        }),
    )
}

/// Writes both port defaults back to the store.
///
/// # Errors
///
/// Returns an error if the store cannot be written
pub fn reset_ports_to_default(prefs: &dyn PreferenceStore) -> BridgeResult<()> {
    prefs.put_string(PREF_KEY_PORT, &PORT_DEFAULT_VAL.to_string())?;
    prefs.put_string(PREF_KEY_SECURE_PORT, &SECURE_PORT_DEFAULT_VAL.to_string())?;
    Ok(())
}
