//! Virtual filesystem adapter.
//!
//! Maps the native filesystem onto the remote-file contract the protocol
//! engines expect.
//!
//! # Architecture
//!
//! 1. [`PathNode`] - immutable native path plus metadata snapshot; all
//!    shared behaviour lives here
//! 2. [`RemoteFile`] - capability trait every protocol specialization
//!    implements by delegating to its `PathNode`
//! 3. [`FtpFile`] / [`SftpFile`] - one specialization per protocol; they
//!    differ only in how ownership is rendered and how outcomes map to
//!    protocol status codes
//! 4. [`FileSystemView`] - per-session home and working directory
//!
//! Every stat-like call is total. Missing files, existing targets and
//! permission refusals are answered with `false` or empty results; only
//! handle acquisition returns errors.
//!
//! # Example
//!
//! ```rust,no_run
//! use bridgeftpd_server::metrics::HandleMetrics;
//! use bridgeftpd_server::vfs::{FtpFile, PathNode, PrincipalContext, RemoteFile};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let principal = PrincipalContext::new("user");
//! let node = PathNode::resolve("/tmp", HandleMetrics::new()).await;
//! let dir = FtpFile::bind(node, principal);
//!
//! for entry in dir.list().await {
//!     println!("{}", entry.list_line());
//! }
//! # }
//! ```

mod ftp;
mod handle;
mod node;
mod sftp;
mod view;

pub use ftp::{FtpFile, FtpReply};
pub use handle::{ReadHandle, WriteHandle};
pub use node::PathNode;
pub use sftp::{FileAttributes, FileMode, SftpFile, SftpStatusCode};
pub use view::FileSystemView;

use async_trait::async_trait;
use bridgeftpd_platform::BridgeResult;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// The authenticated identity of a session.
///
/// Reported as both owner and group of every file the session sees.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PrincipalContext {
    name: Arc<str>,
}

impl PrincipalContext {
    /// Creates the context for `name`.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for PrincipalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrincipalContext").field(&self.name()).finish()
    }
}

/// Remote-file capabilities shared by every protocol specialization.
///
/// Implementors provide [`RemoteFile::bind`], [`RemoteFile::node`] and
/// [`RemoteFile::principal`]; everything else delegates to the node.
/// Derived files (children, listing entries, parents) are bound to the
/// same principal.
#[async_trait]
pub trait RemoteFile: Sized + Send + Sync + 'static {
    /// Wraps a node for the session of `principal`.
    fn bind(node: PathNode, principal: PrincipalContext) -> Self;

    /// The underlying node.
    fn node(&self) -> &PathNode;

    /// The session identity.
    fn principal(&self) -> &PrincipalContext;

    /// Owner name shown to clients.
    fn owner_name(&self) -> &str {
        self.principal().name()
    }

    /// Group name shown to clients.
    fn group_name(&self) -> &str {
        self.principal().name()
    }

    /// Lists the directory; empty for anything else.
    async fn list(&self) -> Vec<Self> {
        let principal = self.principal().clone();
        self.node()
            .list()
            .await
            .into_iter()
            .map(|n| Self::bind(n, principal.clone()))
            .collect()
    }

    /// File named `name` inside this directory. Creates nothing.
    async fn create_child(&self, name: &str) -> Self {
        Self::bind(self.node().child(name).await, self.principal().clone())
    }

    /// Parent directory; `None` at the root.
    async fn parent(&self) -> Option<Self> {
        let parent = self.node().parent().await?;
        Some(Self::bind(parent, self.principal().clone()))
    }

    /// Renames to `target`'s path. False if the target exists or the OS
    /// refuses.
    async fn move_to(&self, target: &Self) -> bool {
        self.node().move_to(target.node()).await
    }

    /// Creates this path as a directory.
    async fn mkdir(&self) -> bool {
        self.node().mkdir().await
    }

    /// Deletes this file or empty directory.
    async fn delete(&self) -> bool {
        self.node().delete().await
    }

    /// Opens for reading at `offset`.
    async fn read_handle(&self, offset: u64) -> BridgeResult<ReadHandle> {
        self.node().read_handle(offset).await
    }

    /// Opens for writing at `offset`.
    async fn write_handle(&self, offset: u64) -> BridgeResult<WriteHandle> {
        self.node().write_handle(offset).await
    }

    /// `ls -l` style line with this session's owner and group.
    fn list_line(&self) -> String {
        format_list_line(self.node(), self.owner_name(), self.group_name())
    }
}

/// Renders `drwxr-xr-x 3 owner group 4096 Jan 01 12:00 name`.
pub fn format_list_line(node: &PathNode, owner: &str, group: &str) -> String {
    let modified = node
        .last_modified()
        .map(|t| DateTime::<Utc>::from(t).format("%b %d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}{} {:>3} {} {} {:>12} {} {}",
        if node.is_directory() { 'd' } else { '-' },
        permission_string(node.permissions()),
        node.link_count(),
        owner,
        group,
        node.size(),
        modified,
        node.name()
    )
}

fn permission_string(mode: u32) -> String {
    let mut s = String::with_capacity(9);
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_string() {
        assert_eq!(permission_string(0o755), "rwxr-xr-x");
        assert_eq!(permission_string(0o640), "rw-r-----");
        assert_eq!(permission_string(0), "---------");
    }

    #[test]
    fn test_principal_is_cheap_to_share() {
        let p = PrincipalContext::new("alice");
        let q = p.clone();
        assert_eq!(q.name(), "alice");
        assert_eq!(p, q);
    }
}
