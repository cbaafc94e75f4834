//! Per-session filesystem view.

use super::{PathNode, PrincipalContext, RemoteFile};
use crate::config::ServerConfig;
use crate::metrics::HandleMetrics;
use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Home and working directory of one session.
///
/// Client paths are virtual: `/` is the configured start directory and
/// `..` never climbs above it. A path starting with `~` is taken relative
/// to the home directory as well.
#[derive(Debug)]
pub struct FileSystemView<F: RemoteFile> {
    home: PathBuf,
    cwd: PathBuf,
    principal: PrincipalContext,
    metrics: HandleMetrics,
    _file: PhantomData<fn() -> F>,
}

impl<F: RemoteFile> FileSystemView<F> {
    /// Creates a view rooted at the configured start directory, with the
    /// working directory at the root.
    pub fn new(config: &ServerConfig, principal: PrincipalContext, metrics: HandleMetrics) -> Self {
        Self {
            home: config.start_dir.clone(),
            cwd: PathBuf::from("/"),
            principal,
            metrics,
            _file: PhantomData,
        }
    }

    /// Session identity.
    pub fn principal(&self) -> &PrincipalContext {
        &self.principal
    }

    /// Virtual working directory, as shown to the client.
    pub fn working_path(&self) -> &Path {
        &self.cwd
    }

    /// The home directory.
    pub async fn home_directory(&self) -> F {
        self.bind(self.home.clone()).await
    }

    /// The current working directory.
    pub async fn working_directory(&self) -> F {
        self.bind(self.native(&self.cwd)).await
    }

    /// Changes the working directory. False unless `dir` resolves to an
    /// existing directory.
    pub async fn change_working_directory(&mut self, dir: &str) -> bool {
        let virtual_path = self.normalize(dir);
        let node = PathNode::resolve(self.native(&virtual_path), self.metrics.clone()).await;
        if !node.is_directory() {
            debug!(dir = dir, "not a directory");
            return false;
        }
        self.cwd = virtual_path;
        true
    }

    /// Resolves a client path against the working directory.
    pub async fn file(&self, path: &str) -> F {
        let virtual_path = self.normalize(path);
        self.bind(self.native(&virtual_path)).await
    }

    async fn bind(&self, native: PathBuf) -> F {
        F::bind(
            PathNode::resolve(native, self.metrics.clone()).await,
            self.principal.clone(),
        )
    }

    fn native(&self, virtual_path: &Path) -> PathBuf {
        let relative = virtual_path.strip_prefix("/").unwrap_or(virtual_path);
        if relative.as_os_str().is_empty() {
            self.home.clone()
        } else {
            self.home.join(relative)
        }
    }

    /// Lexically resolves `path` to an absolute virtual path.
    fn normalize(&self, path: &str) -> PathBuf {
        let (base, rest) = if let Some(rest) = path.strip_prefix('~') {
            (PathBuf::from("/"), rest)
        } else if path.starts_with('/') {
            (PathBuf::from("/"), path)
        } else {
            (self.cwd.clone(), path)
        };

        let mut out = base;
        for component in Path::new(rest).components() {
            match component {
                Component::Normal(part) => out.push(part),
                // clamps at the root
                Component::ParentDir => {
                    out.pop();
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::FtpFile;

    fn view(home: &Path) -> FileSystemView<FtpFile> {
        let config = ServerConfig::builder().with_start_dir(home).build().unwrap();
        FileSystemView::new(&config, PrincipalContext::new("user"), HandleMetrics::new())
    }

    #[test]
    fn test_normalize() {
        let v = view(Path::new("/srv/home"));
        assert_eq!(v.normalize("a/b/../c"), PathBuf::from("/a/c"));
        assert_eq!(v.normalize("../../.."), PathBuf::from("/"));
        assert_eq!(v.normalize("/x/./y"), PathBuf::from("/x/y"));
        assert_eq!(v.normalize("~/docs"), PathBuf::from("/docs"));
        assert_eq!(v.native(Path::new("/")), PathBuf::from("/srv/home"));
        assert_eq!(v.native(Path::new("/a")), PathBuf::from("/srv/home/a"));
    }

    #[tokio::test]
    async fn test_change_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("f"), b"x").unwrap();
        let mut v = view(dir.path());

        assert!(v.change_working_directory("sub").await);
        assert_eq!(v.working_path(), Path::new("/sub"));
        assert!(v.file("f").await.node().is_file());

        assert!(!v.change_working_directory("f").await);
        assert!(!v.change_working_directory("missing").await);
        assert_eq!(v.working_path(), Path::new("/sub"));

        assert!(v.change_working_directory("..").await);
        assert_eq!(v.working_directory().await.node().path(), dir.path());
        assert_eq!(v.home_directory().await.owner_name(), "user");
    }

    #[tokio::test]
    async fn test_cannot_escape_home() {
        let dir = tempfile::tempdir().unwrap();
        let v = view(dir.path());
        let f = v.file("../../etc/passwd").await;
        assert_eq!(f.node().path(), dir.path().join("etc").join("passwd"));
        assert!(!f.node().exists());
    }
}
