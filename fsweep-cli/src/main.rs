mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use tracing_subscriber::EnvFilter;

use fsweep_core::{
    CancellationToken, ScanMessage, ScanMode, ScanOptions, ScanOutcome, Scanner, parse_size,
};

use output::{
    ProgressReporter, apply_size_bounds, print_find_report, print_size_report, print_summary,
};

/// fsweep - concurrent folder-size analyzer and file finder
#[derive(Parser, Debug)]
#[command(name = "fsweep")]
#[command(about = "Concurrent folder-size analyzer and file finder")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging (or set RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze sizes of the immediate children of a directory
    Size(SizeArgs),
    /// Find files and directories matching a glob pattern
    Find(FindArgs),
}

#[derive(clap::Args, Debug)]
struct SizeArgs {
    /// Directory to analyze (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Directory names to exclude (comma-separated or repeated)
    #[arg(short, long, value_delimiter = ',')]
    exclude_dirs: Vec<String>,

    /// Maximum recursion depth (unlimited if omitted)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Only report children at least this large (e.g. 1KB, 1.5MB)
    #[arg(long, default_value = "0")]
    min_size: String,

    /// Only report children at most this large (e.g. 100MB, inf)
    #[arg(long, default_value = "inf")]
    max_size: String,

    /// Number of worker threads (defaults to logical CPU count)
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Sort order for the report
    #[arg(long, value_enum, default_value_t = SortBy::Size)]
    sort_by: SortBy,

    /// Reverse the sort order
    #[arg(short, long)]
    reverse: bool,

    /// Disable the progress display
    #[arg(long)]
    no_progress: bool,
}

#[derive(clap::Args, Debug)]
struct FindArgs {
    /// Directory to search in
    path: PathBuf,

    /// Glob pattern to match names against (e.g. "*.txt")
    pattern: String,

    /// Case sensitive matching
    #[arg(short, long)]
    case_sensitive: bool,

    /// Directory names to exclude (comma-separated or repeated)
    #[arg(short, long, value_delimiter = ',')]
    exclude_dirs: Vec<String>,

    /// Regex patterns to exclude (matched against full paths)
    #[arg(short = 'p', long)]
    exclude_patterns: Vec<String>,

    /// File extensions to include (e.g. .txt .log)
    #[arg(short = 't', long)]
    file_types: Vec<String>,

    /// Minimum file size (e.g. 1KB, 1.5MB)
    #[arg(long, default_value = "0")]
    min_size: String,

    /// Maximum file size (e.g. 100MB, inf)
    #[arg(long, default_value = "inf")]
    max_size: String,

    /// Stop after this many results (0 = unlimited)
    #[arg(long, default_value_t = 10_000)]
    max_results: usize,

    /// Maximum recursion depth (unlimited if omitted)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Number of worker threads (defaults to logical CPU count)
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Show file sizes next to matches
    #[arg(short = 'd', long)]
    show_details: bool,

    /// Disable the progress display
    #[arg(long)]
    no_progress: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum SortBy {
    Size,
    Name,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Command::Size(args) => run_size(args),
        Command::Find(args) => run_find(args),
    }
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("fsweep_core=debug,fsweep=debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_size(args: SizeArgs) -> Result<()> {
    let min_size = parse_size(&args.min_size)?;
    let max_size = parse_size(&args.max_size)?;

    let options = ScanOptions {
        mode: ScanMode::Size,
        exclude_dirs: args.exclude_dirs,
        max_depth: args.max_depth,
        max_results: 0,
        workers: args.workers,
        ..Default::default()
    };

    let mut outcome = run_scan(options, args.path.clone(), !args.no_progress)?;
    apply_size_bounds(&mut outcome.result.sizes, min_size, max_size);
    print_size_report(
        &outcome.result,
        &args.path,
        args.sort_by == SortBy::Name,
        args.reverse,
    );
    print_summary(&outcome);
    Ok(())
}

fn run_find(args: FindArgs) -> Result<()> {
    let options = ScanOptions {
        mode: ScanMode::Find,
        pattern: args.pattern,
        case_sensitive: args.case_sensitive,
        exclude_dirs: args.exclude_dirs,
        exclude_patterns: args.exclude_patterns,
        file_types: args.file_types,
        min_size: parse_size(&args.min_size)?,
        max_size: parse_size(&args.max_size)?,
        max_depth: args.max_depth,
        max_results: args.max_results,
        workers: args.workers,
    };

    let outcome = run_scan(options, args.path, !args.no_progress)?;
    print_find_report(&outcome.result, args.show_details);
    print_summary(&outcome);
    Ok(())
}

/// Run a scan to completion, wiring Ctrl-C to its cancellation token and
/// rendering progress messages as they arrive.
fn run_scan(options: ScanOptions, path: PathBuf, show_progress: bool) -> Result<ScanOutcome> {
    let mode = options.mode;
    let scanner = Scanner::new(options);

    let token = scanner.cancellation_token();
    wire_interrupt(token);

    let reporter = show_progress.then(ProgressReporter::new);
    let (rx, handle) = scanner.scan(path);

    for message in rx {
        match message {
            ScanMessage::Progress(snapshot) => {
                if let Some(reporter) = &reporter {
                    reporter.update(&snapshot, mode);
                }
            }
            ScanMessage::Started(_) | ScanMessage::Completed | ScanMessage::Cancelled => {}
        }
    }

    if let Some(reporter) = &reporter {
        reporter.finish();
    }

    handle
        .join()
        .map_err(|_| eyre!("scan thread panicked"))?
        .map_err(Into::into)
}

fn wire_interrupt(token: CancellationToken) {
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nInterrupted, stopping scan...");
        token.cancel();
    }) {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }
}
