//! FTP specialization of the remote-file contract.

use super::{PathNode, PrincipalContext, RemoteFile};
use std::fmt;

/// FTP reply line (RFC 959 section 4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpReply {
    /// Three digit reply code
    pub code: u16,
    /// Reply text
    pub text: &'static str,
}

impl FtpReply {
    /// 250 Requested file action okay, completed
    pub const FILE_ACTION_OK: FtpReply = FtpReply {
        code: 250,
        text: "Requested file action okay, completed.",
    };
    /// 257 "PATHNAME" created
    pub const PATHNAME_CREATED: FtpReply = FtpReply {
        code: 257,
        text: "Directory created.",
    };
    /// 350 Requested file action pending further information
    pub const PENDING_FURTHER_INFO: FtpReply = FtpReply {
        code: 350,
        text: "Requested file action pending further information.",
    };
    /// 450 Requested file action not taken
    pub const FILE_UNAVAILABLE: FtpReply = FtpReply {
        code: 450,
        text: "Requested file action not taken.",
    };
    /// 550 Requested action not taken, file unavailable
    pub const NO_SUCH_FILE: FtpReply = FtpReply {
        code: 550,
        text: "No such file or directory.",
    };
    /// 550 Permission denied
    pub const PERMISSION_DENIED: FtpReply = FtpReply {
        code: 550,
        text: "Permission denied.",
    };
    /// 553 Requested action not taken, file name not allowed
    pub const NAME_NOT_ALLOWED: FtpReply = FtpReply {
        code: 553,
        text: "Requested action not taken. File name not allowed.",
    };

    /// Whether the code is a positive completion or intermediate reply.
    pub fn is_positive(&self) -> bool {
        self.code < 400
    }
}

impl fmt::Display for FtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

/// A file as seen by one FTP session.
#[derive(Debug, Clone)]
pub struct FtpFile {
    node: PathNode,
    principal: PrincipalContext,
}

impl RemoteFile for FtpFile {
    fn bind(node: PathNode, principal: PrincipalContext) -> Self {
        Self { node, principal }
    }

    fn node(&self) -> &PathNode {
        &self.node
    }

    fn principal(&self) -> &PrincipalContext {
        &self.principal
    }
}

impl FtpFile {
    /// RNFR: the source must exist.
    pub fn rename_from_reply(&self) -> FtpReply {
        if self.node.exists() {
            FtpReply::PENDING_FURTHER_INFO
        } else {
            FtpReply::NO_SUCH_FILE
        }
    }

    /// RNTO: renames and maps the outcome; an existing target and an OS
    /// refusal both answer 553.
    pub async fn rename_to(&self, target: &FtpFile) -> FtpReply {
        if !self.node.exists() {
            return FtpReply::NO_SUCH_FILE;
        }
        if self.move_to(target).await {
            FtpReply::FILE_ACTION_OK
        } else {
            FtpReply::NAME_NOT_ALLOWED
        }
    }

    /// DELE / RMD.
    pub async fn delete_reply(&self) -> FtpReply {
        if !self.node.exists() {
            return FtpReply::NO_SUCH_FILE;
        }
        if !self.node.is_removable() {
            return FtpReply::PERMISSION_DENIED;
        }
        if self.delete().await {
            FtpReply::FILE_ACTION_OK
        } else {
            FtpReply::FILE_UNAVAILABLE
        }
    }

    /// MKD.
    pub async fn mkdir_reply(&self) -> FtpReply {
        if self.node.exists() {
            return FtpReply::NAME_NOT_ALLOWED;
        }
        if self.mkdir().await {
            FtpReply::PATHNAME_CREATED
        } else {
            FtpReply::PERMISSION_DENIED
        }
    }

    /// MDTM: `YYYYMMDDHHMMSS` in UTC.
    pub fn modification_stamp(&self) -> Option<String> {
        let t = self.node.last_modified()?;
        Some(
            chrono::DateTime::<chrono::Utc>::from(t)
                .format("%Y%m%d%H%M%S")
                .to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::HandleMetrics;

    async fn file(path: impl Into<std::path::PathBuf>) -> FtpFile {
        FtpFile::bind(
            PathNode::resolve(path, HandleMetrics::new()).await,
            PrincipalContext::new("ftpuser"),
        )
    }

    #[tokio::test]
    async fn test_owner_and_group_are_session_identity() {
        let dir = tempfile::tempdir().unwrap();
        let f = file(dir.path()).await;
        assert_eq!(f.owner_name(), "ftpuser");
        assert_eq!(f.group_name(), "ftpuser");
        assert!(f.list_line().contains(" ftpuser ftpuser "));
        assert!(f.list_line().starts_with('d'));
    }

    #[tokio::test]
    async fn test_rename_to_existing_target_is_553() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"A").unwrap();
        std::fs::write(dir.path().join("b"), b"B").unwrap();

        let a = file(dir.path().join("a")).await;
        let b = file(dir.path().join("b")).await;

        assert_eq!(a.rename_from_reply().code, 350);
        assert_eq!(a.rename_to(&b).await, FtpReply::NAME_NOT_ALLOWED);
        assert_eq!(std::fs::read(dir.path().join("a")).unwrap(), b"A");
        assert_eq!(std::fs::read(dir.path().join("b")).unwrap(), b"B");
    }

    #[tokio::test]
    async fn test_rename_to_new_name_is_250() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"A").unwrap();

        let a = file(dir.path().join("a")).await;
        let c = file(dir.path().join("c")).await;
        assert_eq!(a.rename_to(&c).await, FtpReply::FILE_ACTION_OK);
    }

    #[tokio::test]
    async fn test_missing_file_replies() {
        let dir = tempfile::tempdir().unwrap();
        let ghost = file(dir.path().join("ghost")).await;
        let other = file(dir.path().join("other")).await;

        assert_eq!(ghost.rename_from_reply(), FtpReply::NO_SUCH_FILE);
        assert_eq!(ghost.rename_to(&other).await, FtpReply::NO_SUCH_FILE);
        assert_eq!(ghost.delete_reply().await, FtpReply::NO_SUCH_FILE);
        assert!(ghost.modification_stamp().is_none());
    }

    #[tokio::test]
    async fn test_mkdir_reply() {
        let dir = tempfile::tempdir().unwrap();
        let sub = file(dir.path().join("sub")).await;
        assert_eq!(sub.mkdir_reply().await.code, 257);

        let sub = file(dir.path().join("sub")).await;
        assert_eq!(sub.mkdir_reply().await.code, 553);
        assert_eq!(sub.delete_reply().await.code, 250);
    }

    #[test]
    fn test_reply_display() {
        assert_eq!(
            FtpReply::NO_SUCH_FILE.to_string(),
            "550 No such file or directory."
        );
        assert!(!FtpReply::NAME_NOT_ALLOWED.is_positive());
    }
}
