use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Default cap on cached entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Bounded memoizing map from file path to size.
///
/// Avoids repeated stat calls when the same file is checked more than once
/// during a scan. The capacity bound caps memory on trees with millions of
/// files: once full, sizes are still computed but no longer stored, trading
/// the speedup for a hard memory ceiling.
#[derive(Debug)]
pub struct SizeCache {
    entries: RwLock<HashMap<PathBuf, u64>>,
    capacity: usize,
}

impl SizeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Return the file's size, from cache if present, else via a stat call.
    ///
    /// Returns `None` when the stat fails (vanished file, permission error);
    /// the caller records the warning. Never stores beyond capacity.
    pub fn get_or_stat(&self, path: &Path) -> Option<u64> {
        if let Ok(entries) = self.entries.read()
            && let Some(&size) = entries.get(path)
        {
            return Some(size);
        }

        let size = fs::metadata(path).ok()?.len();

        if let Ok(mut entries) = self.entries.write()
            && entries.len() < self.capacity
        {
            entries.insert(path.to_path_buf(), size);
        }

        Some(size)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SizeCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
