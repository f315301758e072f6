use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::cache::SizeCache;
use crate::filter::PathFilter;
use crate::options::{ScanMode, ScanOptions};

use super::aggregate::{Aggregator, FLUSH_THRESHOLD, LocalBatch};
use super::engine::CancellationToken;
use super::progress::ProgressTracker;
use super::queue::{JobReceiver, JobSender, ScanJob};

/// Immutable state shared by every worker in one scan.
pub(crate) struct ScanContext {
    pub options: ScanOptions,
    pub filter: PathFilter,
    pub cache: SizeCache,
    pub tracker: ProgressTracker,
    pub token: CancellationToken,
}

/// One long-lived worker thread of the scan pool.
pub(crate) struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(
        id: usize,
        ctx: Arc<ScanContext>,
        rx: JobReceiver,
        tx: JobSender,
        aggregator: Arc<Aggregator>,
    ) -> std::io::Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("sweep-{id}"))
            .spawn(move || worker_loop(id, &ctx, &rx, &tx, &aggregator))?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    pub fn join(mut self) {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!(worker = self.id, "worker thread panicked");
        }
    }
}

fn worker_loop(
    id: usize,
    ctx: &ScanContext,
    rx: &JobReceiver,
    tx: &JobSender,
    aggregator: &Aggregator,
) {
    trace!(worker = id, "worker starting");
    let mut batch = LocalBatch::default();

    while let Some(job) = rx.recv(&ctx.token) {
        process_job(ctx, &job, tx, &mut batch);
        tx.complete();

        if batch.len() > FLUSH_THRESHOLD {
            aggregator.flush(&mut batch);
        }
    }

    // Whatever is still buffered when the loop ends
    aggregator.flush(&mut batch);
    trace!(worker = id, "worker exiting");
}

/// List one directory, record matches or sizes, and requeue subdirectories.
fn process_job(ctx: &ScanContext, job: &ScanJob, tx: &JobSender, batch: &mut LocalBatch) {
    let entries = match fs::read_dir(&job.path) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %job.path.display(), error = %e, "cannot list directory");
            ctx.tracker.record_warning();
            return;
        }
    };

    ctx.tracker.add_processed_dirs(1);

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => {
                ctx.tracker.record_warning();
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();

        if ctx.filter.should_exclude(&name, &path) {
            continue;
        }

        // lstat semantics: a symlink is never a directory here, so symlinked
        // trees are never entered (cycle protection)
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => {
                ctx.tracker.record_warning();
                continue;
            }
        };
        let is_dir = file_type.is_dir();

        match ctx.options.mode {
            ScanMode::Find => visit_find(ctx, &name, &path, is_dir, batch),
            ScanMode::Size => {
                if file_type.is_symlink() {
                    continue;
                }
                visit_size(ctx, job, &entry, &name, is_dir, batch);
            }
        }

        if is_dir {
            enqueue_subdir(ctx, job, &name, path, tx);
        }
    }
}

/// Find mode: record the entry if its name matches and it passes the type and
/// size filters.
fn visit_find(ctx: &ScanContext, name: &str, path: &Path, is_dir: bool, batch: &mut LocalBatch) {
    if !ctx.filter.matches_pattern(name) {
        return;
    }

    if is_dir {
        batch.push_dir(path.to_path_buf());
        ctx.tracker.add_found(0, 1);
        return;
    }

    if !ctx.filter.passes_type_filter(path) {
        return;
    }

    if ctx.options.has_size_filter() {
        match ctx.cache.get_or_stat(path) {
            Some(size) if ctx.filter.passes_size_filter(size) => {}
            Some(_) => return,
            None => {
                ctx.tracker.record_warning();
                return;
            }
        }
    }

    batch.push_file(path.to_path_buf());
    ctx.tracker.add_found(1, 0);
}

/// Size mode: accumulate file bytes into the bucket named after the root
/// child this subtree belongs to. Entries directly under the root open their
/// own bucket (directories start at zero so empty children still appear).
fn visit_size(
    ctx: &ScanContext,
    job: &ScanJob,
    entry: &fs::DirEntry,
    name: &str,
    is_dir: bool,
    batch: &mut LocalBatch,
) {
    let bucket = job.bucket.as_deref().unwrap_or(name);

    if is_dir {
        if job.bucket.is_none() {
            batch.add_size(bucket, 0);
        }
        return;
    }

    match entry.metadata() {
        Ok(meta) => batch.add_size(bucket, meta.len()),
        Err(_) => ctx.tracker.record_warning(),
    }
}

/// Requeue a subdirectory unless the depth limit or cancellation forbids it.
fn enqueue_subdir(
    ctx: &ScanContext,
    job: &ScanJob,
    name: &str,
    path: std::path::PathBuf,
    tx: &JobSender,
) {
    let child_depth = job.depth + 1;
    if let Some(max) = ctx.options.max_depth
        && child_depth > max
    {
        return;
    }

    // Once cancelled, drain but stop growing the job graph
    if ctx.token.is_cancelled() {
        return;
    }

    let bucket = match ctx.options.mode {
        ScanMode::Size => Some(
            job.bucket
                .clone()
                .unwrap_or_else(|| name.to_string()),
        ),
        ScanMode::Find => None,
    };

    ctx.tracker.add_total_dirs(1);
    tx.submit(ScanJob {
        path,
        depth: child_depth,
        bucket,
    });
}
