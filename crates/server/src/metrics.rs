//! Metrics for filesystem handles and server sessions
//!
//! All counters use atomic operations so every session of both servers can
//! update one shared instance.
//!
//! # Example
//!
//! ```
//! use bridgeftpd_server::metrics::HandleMetrics;
//!
//! let metrics = HandleMetrics::new();
//! metrics.record_read_opened();
//! assert_eq!(metrics.open_handles(), 1);
//! metrics.record_read_released();
//! assert_eq!(metrics.open_handles(), 0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle and session counters.
#[derive(Debug, Clone, Default)]
pub struct HandleMetrics {
    /// Read handles currently open
    pub read_handles_open: Arc<AtomicU64>,

    /// Write handles currently open
    pub write_handles_open: Arc<AtomicU64>,

    /// Read handles ever acquired
    pub read_handles_total: Arc<AtomicU64>,

    /// Write handles ever acquired
    pub write_handles_total: Arc<AtomicU64>,

    /// Bytes read through handles
    pub bytes_read: Arc<AtomicU64>,

    /// Bytes written through handles
    pub bytes_written: Arc<AtomicU64>,

    /// Client sessions currently being served
    pub sessions_active: Arc<AtomicU64>,

    /// Client sessions accepted
    pub sessions_total: Arc<AtomicU64>,
}

impl HandleMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read handle acquisition
    pub fn record_read_opened(&self) {
        self.read_handles_total.fetch_add(1, Ordering::Relaxed);
        self.read_handles_open.fetch_add(1, Ordering::AcqRel);
    }

    /// Record a read handle release
    pub fn record_read_released(&self) {
        self.read_handles_open.fetch_sub(1, Ordering::AcqRel);
    }

    /// Record a write handle acquisition
    pub fn record_write_opened(&self) {
        self.write_handles_total.fetch_add(1, Ordering::Relaxed);
        self.write_handles_open.fetch_add(1, Ordering::AcqRel);
    }

    /// Record a write handle release
    pub fn record_write_released(&self) {
        self.write_handles_open.fetch_sub(1, Ordering::AcqRel);
    }

    /// Record bytes read
    pub fn record_bytes_read(&self, n: usize) {
        self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Record bytes written
    pub fn record_bytes_written(&self, n: usize) {
        self.bytes_written.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Record a session starting
    pub fn record_session_started(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::AcqRel);
    }

    /// Record a session ending
    pub fn record_session_ended(&self) {
        self.sessions_active.fetch_sub(1, Ordering::AcqRel);
    }

    /// Read and write handles currently open
    pub fn open_handles(&self) -> u64 {
        self.read_handles_open.load(Ordering::Acquire)
            + self.write_handles_open.load(Ordering::Acquire)
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            read_handles_open: self.read_handles_open.load(Ordering::Acquire),
            write_handles_open: self.write_handles_open.load(Ordering::Acquire),
            read_handles_total: self.read_handles_total.load(Ordering::Relaxed),
            write_handles_total: self.write_handles_total.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Acquire),
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`HandleMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Read handles currently open
    pub read_handles_open: u64,
    /// Write handles currently open
    pub write_handles_open: u64,
    /// Read handles ever acquired
    pub read_handles_total: u64,
    /// Write handles ever acquired
    pub write_handles_total: u64,
    /// Bytes read through handles
    pub bytes_read: u64,
    /// Bytes written through handles
    pub bytes_written: u64,
    /// Client sessions currently being served
    pub sessions_active: u64,
    /// Client sessions accepted
    pub sessions_total: u64,
}
