use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

use super::engine::CancellationToken;

/// Flush a worker's local batch into shared state once it holds this many
/// items.
pub const FLUSH_THRESHOLD: usize = 100;

/// Aggregated output of one scan.
///
/// Size mode fills `sizes` (bytes per immediate child of the root, aggregated
/// recursively); find mode fills `files` and `dirs`. Ordering across entries
/// is non-deterministic; callers sort for display.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Size mode: total bytes per immediate child of the root
    pub sizes: HashMap<String, u64>,
    /// Find mode: matching file paths
    pub files: Vec<PathBuf>,
    /// Find mode: matching directory paths
    pub dirs: Vec<PathBuf>,
}

impl ScanResult {
    pub fn count(&self) -> usize {
        self.files.len() + self.dirs.len() + self.sizes.len()
    }

    /// Size mode: sum over all buckets.
    pub fn total_size(&self) -> u64 {
        self.sizes.values().sum()
    }
}

/// Worker-local result buffer. Accumulated without any locking and merged
/// into the shared result in one coarse-grained flush.
#[derive(Debug, Default)]
pub struct LocalBatch {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    sizes: HashMap<String, u64>,
}

impl LocalBatch {
    pub fn push_file(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    pub fn push_dir(&mut self, path: PathBuf) {
        self.dirs.push(path);
    }

    pub fn add_size(&mut self, bucket: &str, bytes: u64) {
        *self.sizes.entry(bucket.to_string()).or_insert(0) += bytes;
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.dirs.len() + self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty() && self.sizes.is_empty()
    }
}

/// Shared result collector.
///
/// The only lock in the result path: held for the O(batch) merge, never
/// during filesystem I/O. Reaching `max_results` trips the cancellation
/// token; the store is idempotent, so concurrent batches crossing the limit
/// together are harmless, and the final count may overshoot by at most the
/// in-flight batches.
pub struct Aggregator {
    shared: Mutex<ScanResult>,
    max_results: usize,
    token: CancellationToken,
}

impl Aggregator {
    /// `max_results == 0` means unlimited.
    pub fn new(max_results: usize, token: CancellationToken) -> Self {
        Self {
            shared: Mutex::new(ScanResult::default()),
            max_results,
            token,
        }
    }

    /// Merge a local batch into the shared result and clear it.
    pub fn flush(&self, batch: &mut LocalBatch) {
        if batch.is_empty() {
            return;
        }

        let count = {
            let mut shared = self.shared.lock().expect("aggregator lock poisoned");
            shared.files.append(&mut batch.files);
            shared.dirs.append(&mut batch.dirs);
            for (bucket, bytes) in batch.sizes.drain() {
                *shared.sizes.entry(bucket).or_insert(0) += bytes;
            }
            shared.count()
        };

        if self.max_results > 0 && count >= self.max_results {
            debug!(count, max = self.max_results, "result limit reached");
            self.token.cancel();
        }
    }

    /// Consume the aggregator and return the merged result.
    pub fn into_result(self) -> ScanResult {
        self.shared.into_inner().expect("aggregator lock poisoned")
    }
}
