//! SFTP specialization of the remote-file contract.
//!
//! Status codes and attribute fields follow SFTP v3
//! (draft-ietf-secsh-filexfer-02), the version every client speaks.

use super::{PathNode, PrincipalContext, RemoteFile};
use bridgeftpd_platform::BridgeError;
use std::time::{Duration, UNIX_EPOCH};

/// SFTP status codes (SSH_FX_*) the adapter answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SftpStatusCode {
    /// SSH_FX_OK
    Ok = 0,
    /// SSH_FX_NO_SUCH_FILE
    NoSuchFile = 2,
    /// SSH_FX_PERMISSION_DENIED
    PermissionDenied = 3,
    /// SSH_FX_FAILURE
    Failure = 4,
}

impl SftpStatusCode {
    /// Maps a handle acquisition error.
    pub fn from_error(err: &BridgeError) -> Self {
        match err {
            BridgeError::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => Self::NoSuchFile,
                std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
                _ => Self::Failure,
            },
            _ => Self::Failure,
        }
    }
}

/// File mode: type bits plus permission bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMode(pub u32);

impl FileMode {
    /// Directory type bits
    pub const S_IFDIR: u32 = 0o040000;
    /// Regular file type bits
    pub const S_IFREG: u32 = 0o100000;
    /// Symbolic link type bits
    pub const S_IFLNK: u32 = 0o120000;

    const S_IFMT: u32 = 0o170000;

    /// Whether the directory type bits are set.
    pub fn is_dir(&self) -> bool {
        self.0 & Self::S_IFMT == Self::S_IFDIR
    }
}

/// Attributes reported by STAT and accepted by SETSTAT. Encoding them is
/// left to the protocol engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAttributes {
    /// File size in bytes
    pub size: Option<u64>,
    /// User ID
    pub uid: Option<u32>,
    /// Group ID
    pub gid: Option<u32>,
    /// Type and permission bits
    pub permissions: Option<FileMode>,
    /// Access time (Unix seconds)
    pub atime: Option<u32>,
    /// Modification time (Unix seconds)
    pub mtime: Option<u32>,
}

impl FileAttributes {
    /// Creates empty attributes.
    pub fn new() -> Self {
        Self::default()
    }
}

/// A file as seen by one SFTP session.
#[derive(Debug, Clone)]
pub struct SftpFile {
    node: PathNode,
    principal: PrincipalContext,
}

impl RemoteFile for SftpFile {
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

impl SftpFile {
    /// STAT / LSTAT answer: attributes, or `NoSuchFile`.
    pub fn stat(&self) -> Result<FileAttributes, SftpStatusCode> {
        if !self.node.exists() {
            return Err(SftpStatusCode::NoSuchFile);
        }
        Ok(self.attributes())
    }

    /// Attributes of the node; empty for missing paths.
    pub fn attributes(&self) -> FileAttributes {
        if !self.node.exists() {
            return FileAttributes::new();
        }
        let type_bits = if self.node.is_directory() {
            FileMode::S_IFDIR
        } else if self.node.is_file() {
            FileMode::S_IFREG
        } else {
            FileMode::S_IFLNK
        };
        let (uid, gid) = self.node.owner_ids();
        let mtime = (self.node.last_modified_millis() / 1000) as u32;
        FileAttributes {
            size: Some(self.node.size()),
            uid: Some(uid),
            gid: Some(gid),
            permissions: Some(FileMode(type_bits | self.node.permissions())),
            atime: Some(self.node.accessed_secs().map(|s| s as u32).unwrap_or(mtime)),
            mtime: Some(mtime),
        }
    }

    /// Long name for SSH_FXP_NAME entries.
    pub fn long_name(&self) -> String {
        self.list_line()
    }

    /// RENAME: an existing target and an OS refusal both answer
    /// `Failure`; v3 has no dedicated "exists" code.
    pub async fn rename_status(&self, target: &SftpFile) -> SftpStatusCode {
        if !self.node.exists() {
            return SftpStatusCode::NoSuchFile;
        }
        if self.move_to(target).await {
            SftpStatusCode::Ok
        } else {
            SftpStatusCode::Failure
        }
    }

    /// REMOVE / RMDIR.
    pub async fn remove_status(&self) -> SftpStatusCode {
        if !self.node.exists() {
            return SftpStatusCode::NoSuchFile;
        }
        if !self.node.is_removable() {
            return SftpStatusCode::PermissionDenied;
        }
        if self.delete().await {
            SftpStatusCode::Ok
        } else {
            SftpStatusCode::Failure
        }
    }

    /// MKDIR.
    pub async fn mkdir_status(&self) -> SftpStatusCode {
        if self.node.exists() {
            return SftpStatusCode::Failure;
        }
        if self.mkdir().await {
            SftpStatusCode::Ok
        } else {
            SftpStatusCode::PermissionDenied
        }
    }

    /// SETSTAT: only the modification time is applied; ownership and
    /// permissions belong to the session identity and are left alone.
    pub async fn apply_attributes(&self, attrs: &FileAttributes) -> SftpStatusCode {
        if !self.node.exists() {
            return SftpStatusCode::NoSuchFile;
        }
        match attrs.mtime {
            Some(mtime) => {
                let when = UNIX_EPOCH + Duration::from_secs(u64::from(mtime));
                if self.node.set_last_modified(when).await {
                    SftpStatusCode::Ok
                } else {
                    SftpStatusCode::PermissionDenied
                }
            }
            None => SftpStatusCode::Ok,
        }
    }
}
