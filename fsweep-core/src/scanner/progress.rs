use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Progress update during scanning
#[derive(Debug, Clone)]
pub enum ScanMessage {
    /// Scan started at the given root
    Started(PathBuf),
    /// Periodic progress update (about every 100ms)
    Progress(ProgressSnapshot),
    /// Scan finished naturally
    Completed,
    /// Scan was cancelled; results are partial
    Cancelled,
}

/// Lock-free progress counters shared by all workers.
///
/// Each counter is independent; a [`ProgressSnapshot`] is consistent enough
/// for display but not linearizable across fields, which is fine for its only
/// consumer (the progress line).
#[derive(Debug)]
pub struct ProgressTracker {
    total_dirs: AtomicU64,
    processed_dirs: AtomicU64,
    found_files: AtomicU64,
    found_dirs: AtomicU64,
    warnings: AtomicU64,
    started: Instant,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            total_dirs: AtomicU64::new(0),
            processed_dirs: AtomicU64::new(0),
            found_files: AtomicU64::new(0),
            found_dirs: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// A directory was discovered and enqueued.
    pub fn add_total_dirs(&self, n: u64) {
        self.total_dirs.fetch_add(n, Ordering::Relaxed);
    }

    /// A directory was listed and processed.
    pub fn add_processed_dirs(&self, n: u64) {
        self.processed_dirs.fetch_add(n, Ordering::Relaxed);
    }

    /// Matches were recorded.
    pub fn add_found(&self, files: u64, dirs: u64) {
        if files > 0 {
            self.found_files.fetch_add(files, Ordering::Relaxed);
        }
        if dirs > 0 {
            self.found_dirs.fetch_add(dirs, Ordering::Relaxed);
        }
    }

    /// An item could not be accessed (permission denied, broken symlink,
    /// vanished mid-scan). Never fatal; surfaced once at the end.
    pub fn record_warning(&self) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total_dirs: self.total_dirs.load(Ordering::Relaxed),
            processed_dirs: self.processed_dirs.load(Ordering::Relaxed),
            found_files: self.found_files.load(Ordering::Relaxed),
            found_dirs: self.found_dirs.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of scan progress.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    /// Directories discovered so far (enqueued)
    pub total_dirs: u64,
    /// Directories listed so far
    pub processed_dirs: u64,
    /// Matching files found so far
    pub found_files: u64,
    /// Matching directories found so far
    pub found_dirs: u64,
    /// Inaccessible items so far
    pub warnings: u64,
    /// Time since the scan started
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn total_found(&self) -> u64 {
        self.found_files + self.found_dirs
    }
}
