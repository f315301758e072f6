/// Which of the two walk instantiations a scan performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Aggregate bytes per immediate child of the root (folder-size analysis)
    Size,
    /// Collect files and directories whose names match a glob pattern
    Find,
}

/// Scanner configuration, built once per invocation and shared read-only
/// across workers.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Walk mode (size aggregation or pattern search)
    pub mode: ScanMode,
    /// Glob pattern for find mode (`*` and `?` wildcards); ignored in size mode
    pub pattern: String,
    /// Case-sensitive pattern matching
    pub case_sensitive: bool,
    /// Directory names excluded by exact match (e.g. "node_modules")
    pub exclude_dirs: Vec<String>,
    /// Regex patterns matched against full paths; matching paths are excluded
    pub exclude_patterns: Vec<String>,
    /// Extension allowlist for file matches (e.g. ".txt"); empty = all
    pub file_types: Vec<String>,
    /// Minimum file size in bytes for a file match
    pub min_size: u64,
    /// Maximum file size in bytes for a file match
    pub max_size: u64,
    /// Maximum recursion depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Stop the scan once this many results have been aggregated
    pub max_results: usize,
    /// Number of worker threads (0 = auto, one per logical CPU)
    pub workers: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            mode: ScanMode::Find,
            pattern: String::from("*"),
            case_sensitive: false,
            exclude_dirs: Vec::new(),
            exclude_patterns: Vec::new(),
            file_types: Vec::new(),
            min_size: 0,
            max_size: u64::MAX,
            max_depth: None,
            max_results: 10_000,
            workers: 0, // auto
        }
    }
}

impl ScanOptions {
    /// Resolved worker-pool size.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            num_cpus::get().max(1)
        }
    }

    /// Whether any file-size constraint is configured.
    pub fn has_size_filter(&self) -> bool {
        self.min_size > 0 || self.max_size < u64::MAX
    }
}
