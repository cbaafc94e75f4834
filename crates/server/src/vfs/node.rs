//! Generic immutable path node.

use crate::metrics::HandleMetrics;
use crate::vfs::handle::{ReadHandle, WriteHandle};
use bridgeftpd_platform::{BridgeError, BridgeResult};
use std::fs::Metadata;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncSeekExt;
use tracing::{debug, warn};

/// A native path plus the metadata observed when the node was built.
///
/// Nodes never change in place. Every operation that alters the
/// filesystem reports its outcome and leaves `self` describing the state
/// seen at construction; resolve the path again to observe the change.
///
/// Every predicate is total: a node for a missing path simply answers
/// `false`, `0` or `None`.
#[derive(Debug, Clone)]
pub struct PathNode {
    path: PathBuf,
    meta: Option<Metadata>,
    parent_writable: bool,
    metrics: HandleMetrics,
}

impl PathNode {
    /// Resolves `path`. Never fails; check [`PathNode::exists`].
    pub async fn resolve(path: impl Into<PathBuf>, metrics: HandleMetrics) -> Self {
        let path = path.into();
        let meta = stat(&path).await;
        let parent_writable = match path.parent() {
            Some(parent) => tokio::fs::metadata(parent)
                .await
                .map(|m| m.is_dir() && !m.permissions().readonly())
                .unwrap_or(false),
            None => false,
        };
        Self {
            path,
            meta,
            parent_writable,
            metrics,
        }
    }

    /// The native path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last path component, `/` for the root.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string())
    }

    /// Full path as presented to clients.
    pub fn absolute_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Whether the path existed at construction.
    pub fn exists(&self) -> bool {
        self.meta.is_some()
    }

    /// Whether this is a directory.
    pub fn is_directory(&self) -> bool {
        self.meta.as_ref().map(|m| m.is_dir()).unwrap_or(false)
    }

    /// Whether this is a regular file.
    pub fn is_file(&self) -> bool {
        self.meta.as_ref().map(|m| m.is_file()).unwrap_or(false)
    }

    /// Dot files are hidden.
    pub fn is_hidden(&self) -> bool {
        let name = self.name();
        name.starts_with('.') && name != "." && name != ".."
    }

    /// Any read bit set.
    pub fn is_readable(&self) -> bool {
        self.exists() && self.permissions() & 0o444 != 0
    }

    /// Existing nodes: not read-only. Missing nodes: the parent accepts
    /// new entries.
    pub fn is_writable(&self) -> bool {
        match &self.meta {
            Some(m) => !m.permissions().readonly(),
            None => self.parent_writable,
        }
    }

    /// Exists, is not the root and the parent accepts removals.
    pub fn is_removable(&self) -> bool {
        self.exists() && self.path.parent().is_some() && self.parent_writable
    }

    /// Size in bytes; 0 for missing paths.
    pub fn size(&self) -> u64 {
        self.meta.as_ref().map(|m| m.len()).unwrap_or(0)
    }

    /// Modification time, if known.
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.meta.as_ref().and_then(|m| m.modified().ok())
    }

    /// Modification time in milliseconds since the epoch; 0 if unknown.
    pub fn last_modified_millis(&self) -> u64 {
        self.last_modified()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Access time in seconds since the epoch, if known.
    pub fn accessed_secs(&self) -> Option<u64> {
        self.meta
            .as_ref()
            .and_then(|m| m.accessed().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
    }

    /// Permission bits (`0o7777` mask); 0 for missing paths.
    pub fn permissions(&self) -> u32 {
        self.meta.as_ref().map(mode_bits).unwrap_or(0)
    }

    /// Native uid/gid, zero where the platform has none.
    pub fn owner_ids(&self) -> (u32, u32) {
        self.meta.as_ref().map(owner_ids).unwrap_or((0, 0))
    }

    /// Hard link count.
    pub fn link_count(&self) -> u32 {
        self.meta.as_ref().map(link_count).unwrap_or(0)
    }

    /// Handle metrics shared with nodes derived from this one.
    pub fn metrics(&self) -> &HandleMetrics {
        &self.metrics
    }

    /// Node for `name` inside this directory. Creates nothing.
    pub async fn child(&self, name: &str) -> PathNode {
        PathNode::resolve(self.path.join(name), self.metrics.clone()).await
    }

    /// Parent directory node; `None` for the root.
    pub async fn parent(&self) -> Option<PathNode> {
        let parent = self.path.parent()?;
        Some(PathNode::resolve(parent, self.metrics.clone()).await)
    }

    /// Reads the directory. Each call is a fresh snapshot; entries come in
    /// native order. Non-directories and unreadable directories list as
    /// empty.
    pub async fn list(&self) -> Vec<PathNode> {
        if !self.is_directory() {
            return Vec::new();
        }

        let mut entries = match tokio::fs::read_dir(&self.path).await {
            Ok(rd) => rd,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "cannot list directory");
                return Vec::new();
            }
        };

        let parent_writable = self.is_writable();
        let mut nodes = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    // vanished between readdir and stat
                    let Some(meta) = stat(&path).await else {
                        continue;
                    };
                    nodes.push(PathNode {
                        path,
                        meta: Some(meta),
                        parent_writable,
                        metrics: self.metrics.clone(),
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "directory listing cut short");
                    break;
                }
            }
        }
        nodes
    }

    /// Creates this path as a directory.
    pub async fn mkdir(&self) -> bool {
        match tokio::fs::create_dir(&self.path).await {
            Ok(()) => true,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "mkdir refused");
                false
            }
        }
    }

    /// Removes this file or empty directory.
    pub async fn delete(&self) -> bool {
        let result = if self.is_directory() {
            tokio::fs::remove_dir(&self.path).await
        } else {
            tokio::fs::remove_file(&self.path).await
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "delete refused");
                false
            }
        }
    }

    /// Renames this path to `target`'s path without ever replacing it.
    ///
    /// Returns false without touching either path when the source is
    /// missing or the target already exists, and false when the OS refuses
    /// the rename. The existence check and the rename are one step: a
    /// target created concurrently is left alone.
    pub async fn move_to(&self, target: &PathNode) -> bool {
        if !self.exists() {
            debug!(from = %self.path.display(), "move source missing");
            return false;
        }
        let from = self.path.clone();
        let to = target.path.clone();
        let result = tokio::task::spawn_blocking(move || rename_no_replace(&from, &to))
            .await
            .unwrap_or_else(|e| Err(io::Error::new(io::ErrorKind::Other, e)));
        match result {
            Ok(()) => {
                debug!(from = %self.path.display(), to = %target.path.display(), "moved");
                true
            }
            Err(e) => {
                debug!(
                    from = %self.path.display(),
                    to = %target.path.display(),
                    error = %e,
                    "move refused"
                );
                false
            }
        }
    }

    /// Sets the modification time.
    pub async fn set_last_modified(&self, time: SystemTime) -> bool {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            std::fs::File::open(&path).and_then(|f| f.set_modified(time))
        })
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
    }

    /// Opens the file for reading starting at `offset`.
    ///
    /// # Errors
    ///
    /// `BridgeError::Io` when the file cannot be opened or positioned.
    /// No handle is counted unless one is returned.
    pub async fn read_handle(&self, offset: u64) -> BridgeResult<ReadHandle> {
        if !self.is_file() {
            return Err(BridgeError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not a file: {}", self.path.display()),
            )));
        }
        let mut file = tokio::fs::File::open(&self.path).await?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok(ReadHandle::new(file, self.path.clone(), self.metrics.clone()))
    }

    /// Opens the file for writing at `offset`, creating it if needed.
    ///
    /// The file is cut to `offset` bytes first, so `0` overwrites and the
    /// current size resumes an interrupted upload.
    ///
    /// # Errors
    ///
    /// `BridgeError::Io` when the path is a directory or cannot be opened.
    pub async fn write_handle(&self, offset: u64) -> BridgeResult<WriteHandle> {
        if self.is_directory() {
            return Err(BridgeError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("is a directory: {}", self.path.display()),
            )));
        }
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.set_len(offset).await?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok(WriteHandle::new(file, self.path.clone(), self.metrics.clone()))
    }
}

/// Follows symlinks; a dangling link still reports its own metadata.
async fn stat(path: &Path) -> Option<Metadata> {
    match tokio::fs::metadata(path).await {
        Ok(m) => Some(m),
        Err(_) => tokio::fs::symlink_metadata(path).await.ok(),
    }
}

#[cfg(unix)]
fn mode_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_bits(meta: &Metadata) -> u32 {
    let base = if meta.is_dir() { 0o755 } else { 0o644 };
    if meta.permissions().readonly() {
        base & !0o222
    } else {
        base
    }
}

#[cfg(unix)]
fn owner_ids(meta: &Metadata) -> (u32, u32) {
    use std::os::unix::fs::MetadataExt;
    (meta.uid(), meta.gid())
}

#[cfg(not(unix))]
fn owner_ids(_meta: &Metadata) -> (u32, u32) {
    (0, 0)
}

#[cfg(unix)]
fn link_count(meta: &Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.nlink() as u32
}

#[cfg(not(unix))]
fn link_count(meta: &Metadata) -> u32 {
    if meta.is_dir() {
        3
    } else {
        1
    }
}

/// Renames `from` to `to`, failing with `AlreadyExists` when `to` exists.
///
/// Files and links get a hard link at `to` first, which the OS refuses
/// atomically if the name is taken, then lose their old name. Directories,
/// and files on filesystems without hard links, claim `to` with an
/// exclusive create and rename over that placeholder.
fn rename_no_replace(from: &Path, to: &Path) -> io::Result<()> {
    let is_dir = std::fs::symlink_metadata(from)?.is_dir();
    if !is_dir {
        match std::fs::hard_link(from, to) {
            Ok(()) => {
                if let Err(e) = std::fs::remove_file(from) {
                    let _ = std::fs::remove_file(to);
                    return Err(e);
                }
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e),
            Err(e) => debug!(from = %from.display(), error = %e, "hard link unavailable"),
        }
    }

    if is_dir {
        std::fs::create_dir(to)?;
    } else {
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(to)?;
    }
    if let Err(e) = std::fs::rename(from, to) {
        // remove_dir keeps a directory placeholder someone has filled
        let _ = if is_dir {
            std::fs::remove_dir(to)
        } else {
            std::fs::remove_file(to)
        };
        return Err(e);
    }
    Ok(())
}
