//! Scoped read and write handles.
//!
//! A handle is counted as open from the moment it is returned until it is
//! dropped. Dropping is the only release path, so the count returns to its
//! baseline whether a transfer completes, fails halfway, or the session
//! task is cancelled because the client went away.

use crate::metrics::HandleMetrics;
use bridgeftpd_platform::BridgeResult;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleKind {
    Read,
    Write,
}

/// Releases the handle count exactly once, on drop.
#[derive(Debug)]
struct Release {
    kind: HandleKind,
    path: PathBuf,
    metrics: HandleMetrics,
}

impl Release {
    fn acquire(kind: HandleKind, path: PathBuf, metrics: HandleMetrics) -> Self {
        match kind {
            HandleKind::Read => metrics.record_read_opened(),
            HandleKind::Write => metrics.record_write_opened(),
        }
        debug!(path = %path.display(), kind = ?kind, "handle acquired");
        Self {
            kind,
            path,
            metrics,
        }
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        match self.kind {
            HandleKind::Read => self.metrics.record_read_released(),
            HandleKind::Write => self.metrics.record_write_released(),
        }
        debug!(path = %self.path.display(), kind = ?self.kind, "handle released");
    }
}

/// Read stream over a native file.
#[derive(Debug)]
pub struct ReadHandle {
    file: File,
    release: Release,
}

impl ReadHandle {
    pub(crate) fn new(file: File, path: PathBuf, metrics: HandleMetrics) -> Self {
        Self {
            file,
            release: Release::acquire(HandleKind::Read, path, metrics),
        }
    }

    /// Path the handle reads from.
    pub fn path(&self) -> &Path {
        &self.release.path
    }
}

impl AsyncRead for ReadHandle {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.file).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            this.release
                .metrics
                .record_bytes_read(buf.filled().len() - before);
        }
        poll
    }
}

/// Write stream over a native file.
#[derive(Debug)]
pub struct WriteHandle {
    file: File,
    release: Release,
}

impl WriteHandle {
    pub(crate) fn new(file: File, path: PathBuf, metrics: HandleMetrics) -> Self {
        Self {
            file,
            release: Release::acquire(HandleKind::Write, path, metrics),
        }
    }

    /// Path the handle writes to.
    pub fn path(&self) -> &Path {
        &self.release.path
    }

    /// Flushes buffered data to the file and releases the handle.
    ///
    /// Dropping without calling this still releases the handle; data the
    /// runtime already accepted is written in the background.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the final flush. The handle is released
    /// before the error reaches the caller.
    pub async fn finish(mut self) -> BridgeResult<()> {
        self.file.flush().await?;
        self.file.sync_data().await?;
        Ok(())
    }
}

impl AsyncWrite for WriteHandle {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.file).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            this.release.metrics.record_bytes_written(*n);
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::PathNode;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_release_on_drop_without_finish() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = HandleMetrics::new();
        let node = PathNode::resolve(dir.path().join("f"), metrics.clone()).await;

        let mut w = node.write_handle(0).await.unwrap();
        w.write_all(b"partial").await.unwrap();
        assert_eq!(metrics.open_handles(), 1);

        drop(w);
        assert_eq!(metrics.open_handles(), 0);
        assert_eq!(metrics.snapshot().write_handles_total, 1);
    }

    #[tokio::test]
    async fn test_release_when_task_is_aborted() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = HandleMetrics::new();
        let node = PathNode::resolve(dir.path().join("f"), metrics.clone()).await;
        let handle = node.write_handle(0).await.unwrap();

        let task = tokio::spawn(async move {
            let _held = handle;
            std::future::pending::<()>().await;
        });
        tokio::task::yield_now().await;
        assert_eq!(metrics.open_handles(), 1);

        task.abort();
        let _ = task.await;
        assert_eq!(metrics.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_failed_acquire_counts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = HandleMetrics::new();
        let node = PathNode::resolve(dir.path(), metrics.clone()).await;

        assert!(node.write_handle(0).await.is_err());
        assert!(node.read_handle(0).await.is_err());
        assert_eq!(metrics.snapshot().write_handles_total, 0);
        assert_eq!(metrics.snapshot().read_handles_total, 0);
    }
}
