use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use fsweep_core::{ProgressSnapshot, ScanMode, ScanOutcome, ScanResult, format_count, format_size};

/// Spinner-based progress line fed by the core's 100ms heartbeat.
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("invalid progress template"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn update(&self, snapshot: &ProgressSnapshot, mode: ScanMode) {
        let msg = match mode {
            ScanMode::Size => format!(
                "Dirs: {}/{} | Warnings: {}",
                format_count(snapshot.processed_dirs),
                format_count(snapshot.total_dirs),
                snapshot.warnings,
            ),
            ScanMode::Find => format!(
                "Dirs: {}/{} | Found: {} files, {} dirs",
                format_count(snapshot.processed_dirs),
                format_count(snapshot.total_dirs),
                format_count(snapshot.found_files),
                format_count(snapshot.found_dirs),
            ),
        };
        self.bar.set_message(msg);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Drop size-report rows outside the configured bounds (inclusive). The
/// totals line then reflects only what is shown.
pub fn apply_size_bounds(sizes: &mut HashMap<String, u64>, min: u64, max: u64) {
    if min == 0 && max == u64::MAX {
        return;
    }
    sizes.retain(|_, size| *size >= min && *size <= max);
}

/// Sorted size table for the immediate children of the scanned directory.
pub fn print_size_report(result: &ScanResult, root: &Path, by_name: bool, reverse: bool) {
    if result.sizes.is_empty() {
        println!("No accessible folders or files found.");
        return;
    }

    let mut rows: Vec<(&String, u64)> = result.sizes.iter().map(|(n, &s)| (n, s)).collect();
    if by_name {
        rows.sort_by(|a, b| a.0.cmp(b.0));
    } else {
        rows.sort_by(|a, b| b.1.cmp(&a.1));
    }
    if reverse {
        rows.reverse();
    }

    let name_width = rows
        .iter()
        .map(|(n, _)| n.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);

    println!();
    println!("{} {}", style("Sizes under").bold(), root.display());
    println!("{}", style("─".repeat(name_width + 14)).dim());
    for (name, size) in &rows {
        println!("  {name:<name_width$}  {}", styled_size(*size));
    }
    println!("{}", style("─".repeat(name_width + 14)).dim());
    println!(
        "  {:<name_width$}  {}",
        "Total",
        style(format_size(result.total_size())).bold()
    );
}

/// Green for small entries, yellow for megabytes, red for gigabytes and up.
fn styled_size(size: u64) -> String {
    let text = format_size(size);
    if size >= 1 << 30 {
        style(text).red().to_string()
    } else if size >= 1 << 20 {
        style(text).yellow().to_string()
    } else {
        style(text).green().to_string()
    }
}

/// Sorted match listing for find mode.
pub fn print_find_report(result: &ScanResult, show_details: bool) {
    println!();
    println!("{}", style("Search Results").bold());
    println!(
        "{} {}",
        style("Files found:").green(),
        format_count(result.files.len() as u64)
    );
    println!(
        "{} {}",
        style("Directories found:").blue(),
        format_count(result.dirs.len() as u64)
    );

    if !result.files.is_empty() {
        println!();
        println!("{}", style("Matching Files:").green().bold());
        let mut files = result.files.clone();
        files.sort();
        for path in files {
            if show_details {
                match std::fs::metadata(&path) {
                    Ok(meta) => println!("  {} ({})", path.display(), format_size(meta.len())),
                    Err(_) => println!("  {} (size unknown)", path.display()),
                }
            } else {
                println!("  {}", path.display());
            }
        }
    }

    if !result.dirs.is_empty() {
        println!();
        println!("{}", style("Matching Directories:").blue().bold());
        let mut dirs = result.dirs.clone();
        dirs.sort();
        for path in dirs {
            println!("  {}", path.display());
        }
    }
}

/// Final one-liners: elapsed, warnings, and the explicit partial notice.
pub fn print_summary(outcome: &ScanOutcome) {
    println!();
    println!(
        "{} {} directories in {:.1}s",
        style("Scanned").dim(),
        format_count(outcome.stats.processed_dirs),
        outcome.stats.elapsed.as_secs_f64()
    );

    let warnings = outcome.warnings();
    if warnings > 0 {
        println!(
            "{}",
            style(format!("Warning: {warnings} items could not be accessed")).yellow()
        );
    }

    if outcome.cancelled {
        println!(
            "{}",
            style("Scan cancelled before completion: results are partial").yellow()
        );
    }
}
