use std::collections::HashSet;
use std::path::Path;

use regex::Regex;

use crate::error::{Result, ScanError};
use crate::options::ScanOptions;

/// Compiled exclusion and match rules.
///
/// Built once from [`ScanOptions`] before any worker starts; all state is
/// read-only afterwards, so the filter is shared freely across threads.
#[derive(Debug)]
pub struct PathFilter {
    exclude_dirs: HashSet<String>,
    exclude_patterns: Vec<Regex>,
    pattern: Regex,
    file_types: HashSet<String>,
    min_size: u64,
    max_size: u64,
}

impl PathFilter {
    pub fn new(options: &ScanOptions) -> Result<Self> {
        let mut regex_pattern = glob_to_regex(&options.pattern);
        if !options.case_sensitive {
            regex_pattern = format!("(?i){regex_pattern}");
        }
        let pattern = Regex::new(&regex_pattern).map_err(|source| ScanError::InvalidPattern {
            pattern: options.pattern.clone(),
            source,
        })?;

        let mut exclude_patterns = Vec::with_capacity(options.exclude_patterns.len());
        for p in &options.exclude_patterns {
            let re = Regex::new(p).map_err(|source| ScanError::InvalidPattern {
                pattern: p.clone(),
                source,
            })?;
            exclude_patterns.push(re);
        }

        let exclude_dirs = options.exclude_dirs.iter().cloned().collect();

        let file_types = options
            .file_types
            .iter()
            .map(|ext| {
                let ext = ext.to_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();

        Ok(Self {
            exclude_dirs,
            exclude_patterns,
            pattern,
            file_types,
            min_size: options.min_size,
            max_size: options.max_size,
        })
    }

    /// True if the entry must be skipped: its name is in the exclude set
    /// (case-sensitive exact match) or its full path matches any exclude
    /// regex. An excluded directory's subtree is never entered.
    pub fn should_exclude(&self, name: &str, path: &Path) -> bool {
        if self.exclude_dirs.contains(name) {
            return true;
        }

        if !self.exclude_patterns.is_empty() {
            let path_str = path.to_string_lossy();
            if self.exclude_patterns.iter().any(|re| re.is_match(&path_str)) {
                return true;
            }
        }

        false
    }

    /// True if the entry name matches the search pattern.
    pub fn matches_pattern(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    /// True if no extension allowlist is configured, or the path's extension
    /// (lower-cased, with leading dot) is in it.
    pub fn passes_type_filter(&self, path: &Path) -> bool {
        if self.file_types.is_empty() {
            return true;
        }
        match path.extension() {
            Some(ext) => {
                let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
                self.file_types.contains(&ext)
            }
            None => false,
        }
    }

    /// True if `size` falls within the configured min/max bounds.
    pub fn passes_size_filter(&self, size: u64) -> bool {
        size >= self.min_size && size <= self.max_size
    }
}

/// Translate a glob pattern into an anchored regex: `*` matches any run of
/// characters, `?` a single character, everything else is literal.
fn glob_to_regex(pattern: &str) -> String {
    let escaped = regex::escape(pattern);
    let translated = escaped.replace("\\*", ".*").replace("\\?", ".");
    format!("^{translated}$")
}
