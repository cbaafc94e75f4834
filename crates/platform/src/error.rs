//! Error types for bridgeftpd

use std::fmt;

/// Unified error type for all bridgeftpd operations
#[derive(Debug)]
pub enum BridgeError {
    /// I/O error
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// Protocol engine error
    Protocol(String),

    /// Security error (key material, authentication)
    Security(String),

    /// A server could not be started
    ServiceStart {
        /// Server name ("ftp" or "sftp")
        server: String,
        /// Underlying cause as reported by the server
        cause: String,
    },

    /// Other error
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl BridgeError {
    /// Returns true for filesystem conditions that are routine for a
    /// multi-client file server (missing file, permission refused,
    /// target already present).
    pub fn is_routine(&self) -> bool {
        match self {
            BridgeError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::AlreadyExists
            ),
            _ => false,
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Io(e) => write!(f, "IO error: {}", e),
            BridgeError::Config(msg) => write!(f, "Configuration error: {}", msg),
            BridgeError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            BridgeError::Security(msg) => write!(f, "Security error: {}", msg),
            BridgeError::ServiceStart { server, cause } => {
                write!(f, "could not start {} server, {}", server, cause)
            }
            BridgeError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Io(e) => Some(e),
            BridgeError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err)
    }
}

/// Result type for bridgeftpd operations
pub type BridgeResult<T> = Result<T, BridgeError>;
