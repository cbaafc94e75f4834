//! Transient user-facing notices.
//!
//! Core logic never shows anything itself. It returns notices and the
//! embedding application decides how to render them (toast, log line,
//! dialog).

use std::fmt;

use crate::service::ServerKind;

/// A transient notice for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A stored port was out of range and has been reset to its default.
    PortInvalid {
        /// Preference key that was corrected
        key: &'static str,
        /// Default that replaced the stored value
        replacement: u16,
    },
    /// No usable authentication mechanism is configured.
    CredentialsRequired,
    /// No interactive caller is attached; the settings screen should be
    /// opened so the user can set a password.
    OpenSettings,
    /// SFTP was requested but no host key exists yet.
    GenerateKey,
    /// A server failed to start.
    StartFailed {
        /// Which server
        server: ServerKind,
        /// Underlying error text
        cause: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::PortInvalid { key, replacement } => write!(
                f,
                "Port must be between 1025 and 63999, {} reset to {}",
                key, replacement
            ),
            Notice::CredentialsRequired => write!(
                f,
                "You have to set a password or enable public key authentication"
            ),
            Notice::OpenSettings => write!(f, "Opening settings"),
            Notice::GenerateKey => {
                write!(f, "Generate a host key before starting the sftp server")
            }
            Notice::StartFailed { server, cause } => {
                write!(f, "could not start {} server, {}", server, cause)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_failed_includes_cause() {
        let notice = Notice::StartFailed {
            server: ServerKind::Sftp,
            cause: "Address already in use".to_string(),
        };
        assert_eq!(
            notice.to_string(),
            "could not start sftp server, Address already in use"
        );
    }
}
