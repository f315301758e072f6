use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use tracing::trace;

use super::engine::CancellationToken;

/// Queue capacity as a multiple of the worker count: large enough to avoid
/// needless overflow sends, small enough to bound memory.
pub const JOBS_PER_WORKER: usize = 64;

/// One directory pending listing. Owned exclusively by whichever worker
/// dequeues it; its path already passed the exclusion filter.
#[derive(Debug, Clone)]
pub struct ScanJob {
    /// Directory to list
    pub path: PathBuf,
    /// Depth below the scan root (root = 0)
    pub depth: usize,
    /// Size mode: name of the root child this subtree accumulates into.
    /// None for the root job itself.
    pub bucket: Option<String>,
}

impl ScanJob {
    pub fn root(path: PathBuf) -> Self {
        Self {
            path,
            depth: 0,
            bucket: None,
        }
    }
}

/// Bounded channel of pending directory jobs plus the in-flight counter that
/// detects termination.
///
/// The in-flight count covers jobs enqueued but not yet fully processed. It is
/// incremented *before* a job goes on the channel and decremented *after* the
/// worker finishes it, so it can only reach zero when the whole reachable tree
/// has been visited. A monitor thread observes zero and closes the queue,
/// which makes every receive loop exit cleanly.
pub struct WorkQueue {
    tx: Sender<ScanJob>,
    rx: Receiver<ScanJob>,
    in_flight: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            in_flight: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Put the root job on the queue. Called once, before any worker starts,
    /// so the channel cannot be full.
    pub fn seed(&self, job: ScanJob) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        // Sole producer at this point and capacity >= 1
        let _ = self.tx.try_send(job);
    }

    pub fn sender(&self) -> JobSender {
        JobSender {
            tx: self.tx.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub fn receiver(&self) -> JobReceiver {
        JobReceiver {
            rx: self.rx.clone(),
            closed: Arc::clone(&self.closed),
        }
    }

    /// Jobs enqueued but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Mark the queue closed; receive loops drain and exit.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Producer handle held by each worker.
#[derive(Clone)]
pub struct JobSender {
    tx: Sender<ScanJob>,
    in_flight: Arc<AtomicUsize>,
}

impl JobSender {
    /// Enqueue a child directory without ever blocking the calling worker.
    ///
    /// Workers are producers and consumers of the same bounded channel; if
    /// every worker blocked on a full queue, none would be left to drain it
    /// and the pool would deadlock. So: try_send first, and on a full queue
    /// hand the job to a detached thread whose only task is the blocking
    /// send. The worker returns to consuming immediately, and the overflow
    /// thread applies gentle backpressure instead of freezing the pool.
    pub fn submit(&self, job: ScanJob) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                trace!(path = %job.path.display(), "work queue full, overflow send");
                let tx = self.tx.clone();
                let in_flight = Arc::clone(&self.in_flight);
                std::thread::spawn(move || {
                    // Fails only when the scan is being torn down; the job is
                    // then abandoned and must not be counted as pending.
                    if tx.send(job).is_err() {
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
            Err(TrySendError::Disconnected(_)) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    /// Mark a dequeued job as fully processed.
    pub fn complete(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Consumer handle held by each worker.
#[derive(Clone)]
pub struct JobReceiver {
    rx: Receiver<ScanJob>,
    closed: Arc<AtomicBool>,
}

impl JobReceiver {
    /// Receive the next job, racing the cancellation token and the closed
    /// flag. Returns None when the scan is over (either way).
    pub fn recv(&self, token: &CancellationToken) -> Option<ScanJob> {
        loop {
            if token.is_cancelled() {
                return None;
            }
            match self.rx.recv_timeout(Duration::from_millis(20)) {
                Ok(job) => return Some(job),
                Err(RecvTimeoutError::Timeout) => {
                    if self.closed.load(Ordering::SeqCst) && self.rx.is_empty() {
                        return None;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}
