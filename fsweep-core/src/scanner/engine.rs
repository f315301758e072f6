use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info};

use crate::cache::SizeCache;
use crate::error::{Result, ScanError};
use crate::filter::PathFilter;
use crate::options::ScanOptions;

use super::aggregate::{Aggregator, ScanResult};
use super::progress::{ProgressSnapshot, ProgressTracker, ScanMessage};
use super::queue::{JOBS_PER_WORKER, ScanJob, WorkQueue};
use super::worker::{ScanContext, Worker};

/// Heartbeat interval for progress messages.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Poll interval for the completion monitor.
const MONITOR_INTERVAL: Duration = Duration::from_millis(10);

/// Cancellation token shared between the engine, its workers, and the caller.
///
/// Cancelling is idempotent; externally triggered (Ctrl-C, timeout) and
/// internally triggered (result limit) cancellation behave identically.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Final output of a scan.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Aggregated sizes or matches
    pub result: ScanResult,
    /// Final progress counters (dirs processed, matches, warnings, elapsed)
    pub stats: ProgressSnapshot,
    /// True when the scan was cancelled before full traversal; the result is
    /// explicitly partial, not an error
    pub cancelled: bool,
}

impl ScanOutcome {
    /// Number of items that could not be accessed during the scan.
    pub fn warnings(&self) -> u64 {
        self.stats.warnings
    }
}

/// Concurrent directory tree scanner.
///
/// Owns the cancellation context and wires the work queue, worker pool,
/// aggregator and progress tracker together for a single scan. One instance
/// per invocation; independent scans never share state.
pub struct Scanner {
    options: ScanOptions,
    token: CancellationToken,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            token: CancellationToken::new(),
        }
    }

    /// Use an externally owned token (e.g. wired to SIGINT by the CLI).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Scan in a background thread, streaming progress messages.
    ///
    /// The receiver yields `Started`, throttled `Progress` updates, and a
    /// terminal `Completed`/`Cancelled`; the join handle returns the outcome.
    pub fn scan(self, root: PathBuf) -> (Receiver<ScanMessage>, JoinHandle<Result<ScanOutcome>>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = std::thread::spawn(move || self.run(root, Some(tx)));
        (rx, handle)
    }

    /// Scan synchronously; returns when the tree walk completes or is
    /// cancelled.
    pub fn scan_sync(self, root: PathBuf) -> Result<ScanOutcome> {
        self.run(root, None)
    }

    fn run(self, root: PathBuf, tx: Option<Sender<ScanMessage>>) -> Result<ScanOutcome> {
        let root = root.canonicalize().unwrap_or(root);

        // Fail fast before any worker spawns: bad root or bad configuration
        // must never produce partial results.
        let meta = fs::metadata(&root).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::RootNotFound(root.clone())
            } else {
                ScanError::Io(e)
            }
        })?;
        if !meta.is_dir() {
            return Err(ScanError::NotADirectory(root));
        }

        let filter = PathFilter::new(&self.options)?;
        let worker_count = self.options.worker_count();

        let ctx = Arc::new(ScanContext {
            filter,
            cache: SizeCache::default(),
            tracker: ProgressTracker::new(),
            token: self.token.clone(),
            options: self.options,
        });

        info!(root = %root.display(), workers = worker_count, "starting scan");

        let queue = Arc::new(WorkQueue::new(worker_count * JOBS_PER_WORKER));
        ctx.tracker.add_total_dirs(1);
        queue.seed(ScanJob::root(root.clone()));

        if let Some(tx) = &tx {
            let _ = tx.send(ScanMessage::Started(root));
        }

        let aggregator = Arc::new(Aggregator::new(
            ctx.options.max_results,
            self.token.clone(),
        ));

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            workers.push(Worker::spawn(
                id,
                Arc::clone(&ctx),
                queue.receiver(),
                queue.sender(),
                Arc::clone(&aggregator),
            )?);
        }

        // Monitor: natural completion is in-flight reaching zero; closing
        // the queue lets the receive loops drain and exit.
        let monitor = {
            let queue = Arc::clone(&queue);
            let token = self.token.clone();
            std::thread::spawn(move || {
                loop {
                    if queue.in_flight() == 0 || token.is_cancelled() {
                        queue.close();
                        break;
                    }
                    std::thread::sleep(MONITOR_INTERVAL);
                }
            })
        };

        // Heartbeat: publish a snapshot every 100ms while workers run.
        let done = Arc::new(AtomicBool::new(false));
        let heartbeat = tx.clone().map(|tx| {
            let ctx = Arc::clone(&ctx);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    std::thread::sleep(PROGRESS_INTERVAL);
                    let _ = tx.send(ScanMessage::Progress(ctx.tracker.snapshot()));
                }
            })
        });

        // Even a cancelled scan waits for its workers to wind down; nothing
        // is force-killed and no batch is lost mid-flush.
        for worker in workers {
            worker.join();
        }
        let _ = monitor.join();

        done.store(true, Ordering::Relaxed);
        if let Some(hb) = heartbeat {
            let _ = hb.join();
        }

        let cancelled = self.token.is_cancelled();
        let stats = ctx.tracker.snapshot();
        let result = Arc::into_inner(aggregator)
            .expect("workers joined, aggregator uniquely owned")
            .into_result();

        debug!(
            processed = stats.processed_dirs,
            found = stats.total_found(),
            warnings = stats.warnings,
            cancelled,
            "scan finished"
        );

        if let Some(tx) = &tx {
            let _ = tx.send(ScanMessage::Progress(stats.clone()));
            let _ = tx.send(if cancelled {
                ScanMessage::Cancelled
            } else {
                ScanMessage::Completed
            });
        }

        Ok(ScanOutcome {
            result,
            stats,
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ScanMode, ScanOptions};
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn find_options(pattern: &str) -> ScanOptions {
        ScanOptions {
            mode: ScanMode::Find,
            pattern: pattern.to_string(),
            workers: 4,
            ..Default::default()
        }
    }

    /// Reference walk: every non-excluded path under `dir`, sequentially.
    fn reference_walk(dir: &Path, exclude: &[&str], files: &mut BTreeSet<PathBuf>, dirs: &mut BTreeSet<PathBuf>) {
        for entry in fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            let name = entry.file_name().to_string_lossy().into_owned();
            if exclude.contains(&name.as_str()) {
                continue;
            }
            let path = entry.path();
            if entry.file_type().unwrap().is_dir() {
                dirs.insert(path.clone());
                reference_walk(&path, exclude, files, dirs);
            } else {
                files.insert(path);
            }
        }
    }

    fn build_fixture(root: &Path) {
        // root/{a.txt:100B, sub/b.txt:2048B, sub/exclude_me/c.txt:999999B}
        fs::write(root.join("a.txt"), vec![0u8; 100]).unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/b.txt"), vec![0u8; 2048]).unwrap();
        fs::create_dir(root.join("sub/exclude_me")).unwrap();
        fs::write(root.join("sub/exclude_me/c.txt"), vec![0u8; 999_999]).unwrap();
    }

    #[test]
    fn test_scan_empty_dir() {
        let temp = TempDir::new().unwrap();
        let outcome = Scanner::new(find_options("*"))
            .scan_sync(temp.path().to_path_buf())
            .unwrap();

        assert!(outcome.result.files.is_empty());
        assert!(outcome.result.dirs.is_empty());
        assert_eq!(outcome.warnings(), 0);
        assert!(!outcome.cancelled);
        assert_eq!(outcome.stats.processed_dirs, 1);
    }

    #[test]
    fn test_root_not_found() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("does-not-exist");
        let result = Scanner::new(find_options("*")).scan_sync(missing);
        assert!(matches!(result, Err(ScanError::RootNotFound(_))));
    }

    #[test]
    fn test_root_not_a_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();
        let result = Scanner::new(find_options("*")).scan_sync(file);
        assert!(matches!(result, Err(ScanError::NotADirectory(_))));
    }

    #[test]
    fn test_invalid_exclude_regex_rejected_before_scan() {
        let temp = TempDir::new().unwrap();
        let options = ScanOptions {
            exclude_patterns: vec!["[bad".to_string()],
            ..find_options("*")
        };
        let result = Scanner::new(options).scan_sync(temp.path().to_path_buf());
        assert!(matches!(result, Err(ScanError::InvalidPattern { .. })));
    }

    #[test]
    fn test_find_completeness_matches_sequential_walk() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        for d in 0..4 {
            let dir = root.join(format!("d{d}"));
            fs::create_dir(&dir).unwrap();
            for f in 0..8 {
                fs::write(dir.join(format!("f{f}.dat")), b"x").unwrap();
            }
            fs::create_dir(dir.join("nested")).unwrap();
            fs::write(dir.join("nested/deep.dat"), b"y").unwrap();
        }

        let outcome = Scanner::new(find_options("*"))
            .scan_sync(root.to_path_buf())
            .unwrap();

        let mut want_files = BTreeSet::new();
        let mut want_dirs = BTreeSet::new();
        reference_walk(root, &[], &mut want_files, &mut want_dirs);

        // No double counting either: set size equals vec length
        let got_files: BTreeSet<_> = outcome.result.files.iter().cloned().collect();
        let got_dirs: BTreeSet<_> = outcome.result.dirs.iter().cloned().collect();
        assert_eq!(got_files.len(), outcome.result.files.len());
        assert_eq!(got_dirs.len(), outcome.result.dirs.len());
        assert_eq!(got_files, want_files);
        assert_eq!(got_dirs, want_dirs);
        assert_eq!(outcome.warnings(), 0);
    }

    #[test]
    fn test_concrete_scenario_find() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        build_fixture(root);

        let options = ScanOptions {
            exclude_dirs: vec!["exclude_me".to_string()],
            ..find_options("*.txt")
        };
        let outcome = Scanner::new(options).scan_sync(root.to_path_buf()).unwrap();

        let got: BTreeSet<_> = outcome.result.files.iter().cloned().collect();
        let root = root.canonicalize().unwrap();
        let want: BTreeSet<_> = [root.join("a.txt"), root.join("sub/b.txt")]
            .into_iter()
            .collect();
        assert_eq!(got, want);
        assert!(outcome.result.dirs.is_empty());
        assert_eq!(outcome.warnings(), 0);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn test_concrete_scenario_size() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        build_fixture(root);

        let options = ScanOptions {
            mode: ScanMode::Size,
            exclude_dirs: vec!["exclude_me".to_string()],
            max_results: 0,
            workers: 4,
            ..Default::default()
        };
        let outcome = Scanner::new(options).scan_sync(root.to_path_buf()).unwrap();

        assert_eq!(outcome.result.sizes.get("a.txt"), Some(&100));
        assert_eq!(outcome.result.sizes.get("sub"), Some(&2048));
        assert_eq!(outcome.result.sizes.len(), 2);
        // c.txt never counted
        assert_eq!(outcome.result.total_size(), 2148);
        assert_eq!(outcome.warnings(), 0);
    }

    #[test]
    fn test_size_mode_empty_child_dir_gets_bucket() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("empty")).unwrap();

        let options = ScanOptions {
            mode: ScanMode::Size,
            max_results: 0,
            ..Default::default()
        };
        let outcome = Scanner::new(options)
            .scan_sync(temp.path().to_path_buf())
            .unwrap();
        assert_eq!(outcome.result.sizes.get("empty"), Some(&0));
    }

    #[test]
    fn test_excluded_subtree_never_visited() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("keep")).unwrap();
        fs::write(root.join("keep/k.txt"), b"k").unwrap();
        fs::create_dir_all(root.join("node_modules/a/b/c")).unwrap();
        fs::write(root.join("node_modules/a/b/c/x.txt"), b"x").unwrap();

        let options = ScanOptions {
            exclude_dirs: vec!["node_modules".to_string()],
            ..find_options("*")
        };
        let outcome = Scanner::new(options).scan_sync(root.to_path_buf()).unwrap();

        assert!(
            outcome
                .result
                .files
                .iter()
                .all(|p| !p.to_string_lossy().contains("node_modules"))
        );
        // Zero traversal inside the excluded subtree: only root and "keep"
        // were ever listed.
        assert_eq!(outcome.stats.processed_dirs, 2);
    }

    #[test]
    fn test_max_results_cancels_with_partial_flag() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        // Each directory holds more files than one flush batch, so the limit
        // trips after the first few directories, long before the tree ends.
        for d in 0..24 {
            let dir = root.join(format!("d{d}"));
            fs::create_dir(&dir).unwrap();
            for f in 0..110 {
                fs::write(dir.join(format!("f{f}.log")), b"x").unwrap();
            }
        }

        let options = ScanOptions {
            max_results: 10,
            ..find_options("*.log")
        };
        let outcome = Scanner::new(options).scan_sync(root.to_path_buf()).unwrap();

        assert!(outcome.cancelled, "partial flag must be set");
        // Overshoot by in-flight batches is allowed, but the limit fired
        assert!(outcome.result.count() >= 10);
        // Cancellation bounds the walk: each worker finishes at most the job
        // in hand plus one raced dequeue, nowhere near the 25 directories.
        assert!(
            outcome.stats.processed_dirs < 25,
            "cancelled scan visited the whole tree ({} dirs)",
            outcome.stats.processed_dirs
        );
    }

    #[test]
    fn test_external_cancellation_before_start() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), b"x").unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let outcome = Scanner::new(find_options("*"))
            .with_cancellation(token)
            .scan_sync(temp.path().to_path_buf())
            .unwrap();

        assert!(outcome.cancelled);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/f.txt"), vec![0u8; 10]).unwrap();
        std::os::unix::fs::symlink(root, root.join("sub/loop")).unwrap();

        let options = ScanOptions {
            mode: ScanMode::Size,
            max_results: 0,
            ..Default::default()
        };
        let outcome = Scanner::new(options).scan_sync(root.to_path_buf()).unwrap();

        // The cycle is never entered, so the scan completes and counts each
        // byte once.
        assert!(!outcome.cancelled);
        assert_eq!(outcome.result.sizes.get("sub"), Some(&10));
    }

    #[test]
    fn test_max_depth_limits_descent() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("l1/l2")).unwrap();
        fs::write(root.join("top.txt"), b"t").unwrap();
        fs::write(root.join("l1/mid.txt"), b"m").unwrap();
        fs::write(root.join("l1/l2/deep.txt"), b"d").unwrap();

        let options = ScanOptions {
            max_depth: Some(1),
            ..find_options("*.txt")
        };
        let outcome = Scanner::new(options).scan_sync(root.to_path_buf()).unwrap();

        let names: BTreeSet<_> = outcome
            .result
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains("top.txt"));
        assert!(names.contains("mid.txt"));
        assert!(!names.contains("deep.txt"));
    }

    #[test]
    fn test_scan_message_stream() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), b"x").unwrap();

        let (rx, handle) = Scanner::new(find_options("*")).scan(temp.path().to_path_buf());
        let messages: Vec<_> = rx.iter().collect();
        let outcome = handle.join().unwrap().unwrap();

        assert!(matches!(messages.first(), Some(ScanMessage::Started(_))));
        assert!(matches!(messages.last(), Some(ScanMessage::Completed)));
        assert_eq!(outcome.result.files.len(), 1);
    }
}
